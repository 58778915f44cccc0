use feedwatch_core::{IngestionError, LogEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::stdin::read_events;

/// Line-oriented TCP listener standing in for the dashboard's push feed
pub struct TcpIngestion {
    bind_address: String,
    port: u16,
    max_connections: usize,
}

impl TcpIngestion {
    pub fn new(bind_address: String, port: u16, max_connections: usize) -> Self {
        Self {
            bind_address,
            port,
            max_connections,
        }
    }

    /// Get the full bind address (ip:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Bind and accept connections until the task is dropped
    pub async fn run(self, sender: mpsc::Sender<LogEvent>) -> Result<(), IngestionError> {
        let addr = self.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| IngestionError::Tcp(format!("Failed to bind to {}: {}", addr, e)))?;

        info!(address = %addr, "TCP listener started");
        self.serve(listener, sender).await
    }

    async fn serve(
        self,
        listener: TcpListener,
        sender: mpsc::Sender<LogEvent>,
    ) -> Result<(), IngestionError> {
        let active = Arc::new(AtomicUsize::new(0));

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            if active.load(Ordering::Acquire) >= self.max_connections {
                warn!(
                    peer = %peer_addr,
                    max = self.max_connections,
                    "Max connections reached, rejecting"
                );
                drop(stream);
                continue;
            }

            let now_active = active.fetch_add(1, Ordering::AcqRel) + 1;
            info!(peer = %peer_addr, active = now_active, "New TCP connection");

            let sender = sender.clone();
            let active = Arc::clone(&active);
            let peer_str = peer_addr.to_string();
            tokio::spawn(async move {
                if let Err(e) = handle_tcp_connection(stream, &peer_str, sender).await {
                    error!(peer = %peer_str, error = %e, "Connection error");
                }
                active.fetch_sub(1, Ordering::AcqRel);
                debug!(peer = %peer_str, "Connection closed");
            });
        }
    }
}

/// Handle a single TCP connection
async fn handle_tcp_connection(
    stream: TcpStream,
    peer_addr: &str,
    sender: mpsc::Sender<LogEvent>,
) -> Result<usize, IngestionError> {
    let count = read_events(BufReader::new(stream), &sender, IngestionError::Tcp).await?;
    debug!(peer = %peer_addr, events = count, "TCP connection completed");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedwatch_core::LogLevel;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_tcp_ingestion_creation() {
        let tcp = TcpIngestion::new("127.0.0.1".to_string(), 9514, 100);
        assert_eq!(tcp.bind_addr(), "127.0.0.1:9514");
    }

    #[tokio::test]
    async fn test_tcp_connection_handling() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (sender, mut receiver) = mpsc::channel(100);

        let handle = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            handle_tcp_connection(stream, &peer.to_string(), sender).await
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"{\"level\":\"ERROR\",\"message\":\"Failed to parse a\"}\n")
            .await
            .unwrap();
        client.write_all(b"INFO - Phase 1 started\n").await.unwrap();
        drop(client);

        assert_eq!(handle.await.unwrap().unwrap(), 2);

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.level, LogLevel::Error);
        assert_eq!(first.message, "Failed to parse a");

        let second = receiver.recv().await.unwrap();
        assert_eq!(second.message, "INFO - Phase 1 started");
    }

    #[tokio::test]
    async fn test_tcp_connection_skips_invalid_utf8() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (sender, mut receiver) = mpsc::channel(100);

        let handle = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            handle_tcp_connection(stream, &peer.to_string(), sender).await
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"\xfe\xff garbage\nPhase 2 started\n")
            .await
            .unwrap();
        drop(client);

        assert_eq!(handle.await.unwrap().unwrap(), 1);
        assert_eq!(receiver.recv().await.unwrap().message, "Phase 2 started");
    }

    #[tokio::test]
    async fn test_serve_accepts_multiple_clients() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (sender, mut receiver) = mpsc::channel(100);

        let tcp = TcpIngestion::new("127.0.0.1".to_string(), addr.port(), 4);
        let server = tokio::spawn(tcp.serve(listener, sender));

        for i in 0..3 {
            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(format!("WARNING client {i}\n").as_bytes())
                .await
                .unwrap();
        }

        let mut messages = Vec::new();
        for _ in 0..3 {
            messages.push(receiver.recv().await.unwrap().message);
        }
        messages.sort();
        assert_eq!(messages, vec!["WARNING client 0", "WARNING client 1", "WARNING client 2"]);

        server.abort();
    }
}
