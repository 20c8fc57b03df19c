use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use crate::types;

mod config;
mod consts;
mod stats;
mod utils;

pub use config::Config;
pub use stats::Stats;

type ClientTx = tokio::sync::mpsc::Sender<types::ClientMessage>;
type ServerTx = tokio::sync::broadcast::Sender<LiveEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<LiveEvent>;

/// Everything the receive task can hand to subscribers.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    Message(types::ServerMessage),
    Close { reason: Option<String> },
    Error(String),
}

struct Connection {
    send_handle: tokio::task::JoinHandle<()>,
    recv_handle: tokio::task::JoinHandle<()>,
}

pub struct Client {
    capacity: usize,
    config: Config,
    c_tx: Option<ClientTx>,
    s_tx: Option<ServerTx>,
    connection: Option<Connection>,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    fn new(capacity: usize, config: Config) -> Self {
        Self {
            capacity,
            config,
            c_tx: None,
            s_tx: None,
            connection: None,
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    async fn connect(&mut self) -> anyhow::Result<()> {
        if self.c_tx.is_some() {
            anyhow::bail!("already connected");
        }

        let request = utils::build_request(&self.config)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;

        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel(self.capacity);
        let (s_tx, _) = tokio::sync::broadcast::channel(self.capacity);

        self.c_tx = Some(c_tx.clone());
        self.s_tx = Some(s_tx.clone());

        let send_stats = self.stats.clone();
        let send_handle = tokio::spawn(async move {
            while let Some(message) = c_rx.recv().await {
                if let types::ClientMessage::RealtimeInput(ref input) = message {
                    if let Some(chunks) = &input.realtime_input.media_chunks {
                        if let Ok(mut stats) = send_stats.lock() {
                            stats.record_media_sent(chunks.len() as u64);
                        }
                    }
                }
                match serde_json::to_string(&message) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize message: {}", e);
                    }
                }
            }
        });

        let recv_stats = self.stats.clone();
        let recv_handle = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        let _ = s_tx.send(LiveEvent::Error(e.to_string()));
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<types::ServerMessage>(&text) {
                        Ok(server_message) => {
                            update_stats(&recv_stats, &server_message);
                            if s_tx.send(LiveEvent::Message(server_message)).is_err() {
                                tracing::debug!("no subscribers for server message");
                            }
                        }
                        Err(e) => {
                            tracing::error!("failed to deserialize message: {}, text=> {:?}", e, text);
                        }
                    },
                    Message::Binary(bin) => {
                        // some servers deliver the same JSON as binary frames
                        match serde_json::from_slice::<types::ServerMessage>(&bin) {
                            Ok(server_message) => {
                                update_stats(&recv_stats, &server_message);
                                if s_tx.send(LiveEvent::Message(server_message)).is_err() {
                                    tracing::debug!("no subscribers for server message");
                                }
                            }
                            Err(e) => {
                                tracing::warn!("failed to deserialize binary message: {}", e);
                            }
                        }
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        let _ = s_tx.send(LiveEvent::Close {
                            reason: reason.map(|f| f.reason.to_string()),
                        });
                        break;
                    }
                    _ => {}
                }
            }
        });

        self.connection = Some(Connection {
            send_handle,
            recv_handle,
        });
        Ok(())
    }

    pub fn server_events(&self) -> anyhow::Result<ServerRx> {
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => anyhow::bail!("not connected yet"),
        }
    }

    pub fn stats(&self) -> anyhow::Result<Stats> {
        match self.stats.lock() {
            Ok(guard) => Ok(guard.clone()),
            Err(_) => anyhow::bail!("failed to read stats"),
        }
    }

    async fn send_message(&mut self, message: types::ClientMessage) -> anyhow::Result<()> {
        match self.c_tx {
            Some(ref tx) => {
                tx.send(message).await?;
                Ok(())
            }
            None => anyhow::bail!("not connected yet"),
        }
    }

    /// Sends the one-time session configuration. Must be the first message.
    pub async fn setup(&mut self, config: types::SessionConfig) -> anyhow::Result<()> {
        self.send_message(types::ClientMessage::Setup(config.into_setup()))
            .await
    }

    /// Forwards one encoded microphone frame.
    pub async fn send_media(&mut self, chunk: types::Blob) -> anyhow::Result<()> {
        self.send_message(types::ClientMessage::media(chunk)).await
    }

    /// Sends free text over the realtime channel.
    pub async fn send_text(&mut self, text: String) -> anyhow::Result<()> {
        self.send_message(types::ClientMessage::text(text)).await
    }

    /// Drops the outbound channel and aborts both connection tasks.
    /// Safe to call more than once.
    pub fn close(&mut self) {
        self.c_tx = None;
        if let Some(connection) = self.connection.take() {
            connection.send_handle.abort();
            connection.recv_handle.abort();
        }
    }
}

fn update_stats(stats: &Arc<Mutex<Stats>>, message: &types::ServerMessage) {
    let Some(content) = &message.server_content else {
        return;
    };
    let Ok(mut stats) = stats.lock() else {
        tracing::error!("failed to update stats");
        return;
    };
    if let Some(turn) = &content.model_turn {
        let chunks = turn.parts.iter().filter(|p| p.inline_data.is_some()).count();
        if chunks > 0 {
            stats.record_audio_received(chunks as u64);
        }
    }
    if content.turn_complete.unwrap_or(false) {
        stats.record_turn_completed();
    }
}

pub async fn connect_with_config(capacity: usize, config: Config) -> anyhow::Result<Client> {
    let mut client = Client::new(capacity, config);
    client.connect().await?;
    Ok(client)
}

pub async fn connect() -> anyhow::Result<Client> {
    let config = Config::new();
    connect_with_config(1024, config).await
}
