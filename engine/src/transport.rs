//! Trait seam between the session engine and the streaming transport, plus
//! the WebSocket-backed implementation used in production.

use anyhow::Result;
use async_trait::async_trait;
use studyhall_live::LiveEvent;
use studyhall_live_types as types;
use tokio::sync::mpsc;

/// A live, bidirectional connection to the speech model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LiveTransport: Send {
    /// Sends the one-time session configuration.
    async fn send_setup(&mut self, config: types::SessionConfig) -> Result<()>;

    /// Forwards one encoded microphone frame.
    async fn send_media(&mut self, chunk: types::Blob) -> Result<()>;

    /// Sends a free-text directive over the realtime channel.
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Tears the connection down. Safe to call more than once.
    fn close(&mut self);
}

/// Opens transports. The engine only ever sees this seam, so tests can hand
/// it a mock and sessions never touch sockets directly.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<(Box<dyn LiveTransport>, mpsc::Receiver<LiveEvent>)>;
}

pub struct WsTransport {
    client: studyhall_live::Client,
}

#[async_trait]
impl LiveTransport for WsTransport {
    async fn send_setup(&mut self, config: types::SessionConfig) -> Result<()> {
        self.client.setup(config).await
    }

    async fn send_media(&mut self, chunk: types::Blob) -> Result<()> {
        self.client.send_media(chunk).await
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.client.send_text(text).await
    }

    fn close(&mut self) {
        self.client.close();
    }
}

pub struct WsConnector {
    config: studyhall_live::Config,
    capacity: usize,
}

impl WsConnector {
    pub fn new(config: studyhall_live::Config) -> Self {
        Self {
            config,
            capacity: 1024,
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<(Box<dyn LiveTransport>, mpsc::Receiver<LiveEvent>)> {
        let client = studyhall_live::connect_with_config(self.capacity, self.config.clone()).await?;
        let mut broadcast_rx = client.server_events()?;

        // Fan the broadcast channel into an owned mpsc receiver the session
        // can hold; lagging only costs warnings, closing forwards as Close.
        let (tx, rx) = mpsc::channel(128);
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("live event stream lagged by {} messages", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        let _ = tx.send(LiveEvent::Close { reason: None }).await;
                        break;
                    }
                }
            }
        });

        Ok((Box::new(WsTransport { client }), rx))
    }
}
