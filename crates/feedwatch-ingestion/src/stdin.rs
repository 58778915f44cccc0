use feedwatch_core::{IngestionError, LogEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::parse::parse_event_line;

/// Reads event lines from stdin and sends them through a channel
#[derive(Debug, Default)]
pub struct StdinReader;

impl StdinReader {
    pub fn new() -> Self {
        Self
    }

    /// Read until EOF or until the channel is closed.
    ///
    /// Returns the number of events sent.
    pub async fn run(self, sender: mpsc::Sender<LogEvent>) -> Result<usize, IngestionError> {
        info!("Starting stdin ingestion");
        let count =
            read_events(BufReader::new(tokio::io::stdin()), &sender, IngestionError::Stdin).await?;
        info!(events = count, "Stdin EOF reached");
        Ok(count)
    }
}

/// Shared line loop for stream sources; `read_error` wraps I/O failures
pub(crate) async fn read_events<R>(
    mut reader: R,
    sender: &mpsc::Sender<LogEvent>,
    read_error: fn(String) -> IngestionError,
) -> Result<usize, IngestionError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| read_error(e.to_string()))?;
        if read == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim_end_matches(['\n', '\r']),
            Err(e) => {
                warn!(error = %e, bytes = buf.len(), "Skipping event line with invalid UTF-8");
                continue;
            }
        };

        let event = match parse_event_line(line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "Skipping malformed event line");
                continue;
            }
        };

        debug!(level = %event.level, "Received event");
        if sender.send(event).await.is_err() {
            warn!("Channel closed, stopping reader");
            return Err(IngestionError::ChannelClosed);
        }
        count += 1;
    }

    Ok(count)
}
