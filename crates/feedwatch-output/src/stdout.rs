use feedwatch_core::OutputError;
use feedwatch_filter::Outcome;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tracing::debug;

/// Output format for display lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// The display line as produced by the filter
    #[default]
    Plain,
    /// One `{"line": ...}` object per line
    Json,
}

impl OutputFormat {
    /// Unknown names fall back to plain
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Plain,
        }
    }
}

/// Writes filter outcomes to stdout, or any other async writer
pub struct StdoutWriter<W = Stdout> {
    format: OutputFormat,
    out: W,
}

impl StdoutWriter<Stdout> {
    pub fn new() -> Self {
        Self::with_format(OutputFormat::default())
    }

    pub fn with_format(format: OutputFormat) -> Self {
        Self {
            format,
            out: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutWriter<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: AsyncWrite + Unpin> StdoutWriter<W> {
    /// Write to an arbitrary sink instead of stdout
    pub fn from_writer(format: OutputFormat, out: W) -> Self {
        Self { format, out }
    }

    /// Write every line of an outcome; returns how many were written
    pub async fn write(&mut self, outcome: &Outcome) -> Result<usize, OutputError> {
        let lines: &[String] = match outcome {
            Outcome::Suppressed | Outcome::Deferred => return Ok(0),
            Outcome::Line(line) => std::slice::from_ref(line),
            Outcome::Burst(lines) => lines,
        };

        let mut buf = String::new();
        for line in lines {
            buf.push_str(&self.format_line(line)?);
            buf.push('\n');
        }

        self.out
            .write_all(buf.as_bytes())
            .await
            .map_err(|e| OutputError::Stdout(e.to_string()))?;

        self.out
            .flush()
            .await
            .map_err(|e| OutputError::Stdout(e.to_string()))?;

        debug!(format = ?self.format, lines = lines.len(), "Wrote lines");
        Ok(lines.len())
    }

    fn format_line(&self, line: &str) -> Result<String, OutputError> {
        match self.format {
            OutputFormat::Plain => Ok(line.to_string()),
            OutputFormat::Json => serde_json::to_string(&serde_json::json!({ "line": line }))
                .map_err(|e| OutputError::Serialization(e.to_string())),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_name() {
        assert_eq!(OutputFormat::from_name("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_name("plain"), OutputFormat::Plain);
        assert_eq!(OutputFormat::from_name("pretty"), OutputFormat::Plain);
    }

    #[tokio::test]
    async fn test_write_plain_burst() {
        let mut writer = StdoutWriter::from_writer(OutputFormat::Plain, Vec::new());
        let written = writer
            .write(&Outcome::Burst(vec!["c обработан".into(), "b обработан".into()]))
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            String::from_utf8(writer.into_inner()).unwrap(),
            "c обработан\nb обработан\n"
        );
    }

    #[tokio::test]
    async fn test_write_json() {
        let mut writer = StdoutWriter::from_writer(OutputFormat::Json, Vec::new());
        writer.write(&Outcome::Line("say \"hi\"".into())).await.unwrap();
        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(out, "{\"line\":\"say \\\"hi\\\"\"}\n");
    }

    #[tokio::test]
    async fn test_write_nothing_for_empty_outcomes() {
        let mut writer = StdoutWriter::from_writer(OutputFormat::Plain, Vec::new());
        assert_eq!(writer.write(&Outcome::Deferred).await.unwrap(), 0);
        assert_eq!(writer.write(&Outcome::Suppressed).await.unwrap(), 0);
        assert!(writer.into_inner().is_empty());
    }
}
