use feedwatch_core::{Config, LogEvent, Result};
use feedwatch_filter::{FilterStats, LogFilter, Outcome};
use feedwatch_output::{LogView, StdoutWriter};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Owns the filter for one session and feeds its output to the sinks
pub struct Pipeline {
    filter: LogFilter,
    view: LogView,
}

impl Pipeline {
    pub fn new(filter: LogFilter, view: LogView) -> Self {
        Self { filter, view }
    }

    /// Create a pipeline from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let filter = LogFilter::new(&config.filter)?;
        let view = LogView::new(config.output.view.max_lines);
        info!(
            min_interval_ms = config.filter.min_interval_ms,
            burst_size = config.filter.burst_size,
            view_lines = config.output.view.max_lines,
            "Pipeline initialized"
        );
        Ok(Self::new(filter, view))
    }

    /// Run one event through the filter and record any lines in the view
    pub fn handle(&mut self, event: LogEvent) -> Outcome {
        let outcome = self.filter.process_event(event);
        if !outcome.is_empty() {
            self.view.push_outcome(outcome.clone());
        }
        outcome
    }

    /// Drain the channel until every sender is gone.
    ///
    /// Sink errors are logged and the event stream continues.
    pub async fn run<W>(
        &mut self,
        mut receiver: mpsc::Receiver<LogEvent>,
        mut writer: Option<&mut StdoutWriter<W>>,
    ) -> FilterStats
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(event) = receiver.recv().await {
            let outcome = self.handle(event);
            if outcome.is_empty() {
                continue;
            }

            if let Some(writer) = writer.as_deref_mut() {
                if let Err(e) = writer.write(&outcome).await {
                    warn!(error = %e, "Output error");
                }
            }
        }

        let stats = self.filter.stats();
        info!(
            received = stats.received,
            emitted = stats.emitted,
            suppressed = stats.suppressed,
            deferred = stats.deferred,
            discarded = stats.discarded,
            overflowed = stats.overflowed,
            pending = self.filter.pending_len(),
            "Event stream ended"
        );
        debug!(view_lines = self.view.len(), "Final view size");
        stats
    }

    pub fn view(&self) -> &LogView {
        &self.view
    }

    pub fn filter(&self) -> &LogFilter {
        &self.filter
    }

    pub fn stats(&self) -> FilterStats {
        self.filter.stats()
    }
}
