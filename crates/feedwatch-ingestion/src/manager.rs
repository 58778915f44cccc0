use crate::{StdinReader, TcpIngestion};
use feedwatch_core::config::IngestionConfig;
use feedwatch_core::LogEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Starts the configured event sources and owns their tasks
pub struct IngestionManager {
    config: IngestionConfig,
    sender: Option<mpsc::Sender<LogEvent>>,
    handles: Vec<JoinHandle<()>>,
}

impl IngestionManager {
    pub fn new(config: IngestionConfig, sender: mpsc::Sender<LogEvent>) -> Self {
        Self {
            config,
            sender: Some(sender),
            handles: Vec::new(),
        }
    }

    /// Start all enabled sources.
    ///
    /// The manager gives up its own sender afterwards, so the channel closes
    /// once every started source has finished. Returns the number of sources
    /// started; calling it twice starts nothing the second time.
    pub fn start(&mut self) -> usize {
        let Some(sender) = self.sender.take() else {
            return 0;
        };
        let mut count = 0;

        if self.config.stdin.enabled {
            let sender = sender.clone();
            let handle = tokio::spawn(async move {
                if let Err(e) = StdinReader::new().run(sender).await {
                    tracing::error!(error = %e, "Stdin ingestion error");
                }
            });
            self.handles.push(handle);
            count += 1;
            info!("Started stdin ingestion");
        }

        if self.config.tcp.enabled {
            let sender = sender.clone();
            let tcp = TcpIngestion::new(
                self.config.tcp.bind_address.clone(),
                self.config.tcp.port,
                self.config.tcp.max_connections,
            );
            let handle = tokio::spawn(async move {
                if let Err(e) = tcp.run(sender).await {
                    tracing::error!(error = %e, "TCP ingestion error");
                }
            });
            self.handles.push(handle);
            count += 1;
            info!(
                address = %self.config.tcp.bind_address,
                port = self.config.tcp.port,
                "Started TCP ingestion"
            );
        }

        count
    }

    /// Stop every source task
    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    pub fn active_count(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    pub fn has_stdin(&self) -> bool {
        self.config.stdin.enabled
    }

    pub fn has_network(&self) -> bool {
        self.config.tcp.enabled
    }
}

impl Drop for IngestionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
