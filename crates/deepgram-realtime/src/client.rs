use crate::types;
use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

pub mod config;
mod consts;
mod utils;

pub type ClientTx = tokio::sync::mpsc::Sender<types::ClientEvent>;
type ServerTx = tokio::sync::broadcast::Sender<types::ServerEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<types::ServerEvent>;

/// A live transcription connection. Holds the writer channel, the broadcast
/// side for incoming events, and the keep-alive task handle. At most one
/// connection exists per session; `disconnect` is safe to call at any time,
/// any number of times.
pub struct Client {
    capacity: usize,
    config: config::Config,
    c_tx: Option<ClientTx>,
    s_tx: Option<ServerTx>,
    keep_alive: Option<tokio::task::JoinHandle<()>>,
}

impl Client {
    fn new(capacity: usize, config: config::Config) -> Self {
        Self {
            capacity,
            config,
            c_tx: None,
            s_tx: None,
            keep_alive: None,
        }
    }

    async fn connect(&mut self) -> Result<()> {
        if self.c_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }

        let request = utils::build_request(&self.config)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel(self.capacity);
        let (s_tx, _) = tokio::sync::broadcast::channel(self.capacity);

        self.c_tx = Some(c_tx.clone());
        self.s_tx = Some(s_tx.clone());

        // Writer: drain the client channel into the socket.
        tokio::spawn(async move {
            while let Some(event) = c_rx.recv().await {
                let message = match event {
                    types::ClientEvent::Audio(chunk) => Message::Binary(chunk),
                    types::ClientEvent::KeepAlive => {
                        match serde_json::to_string(&types::ControlMessage { kind: "KeepAlive" }) {
                            Ok(text) => Message::Text(text),
                            Err(e) => {
                                tracing::error!("failed to serialize keep-alive: {}", e);
                                continue;
                            }
                        }
                    }
                    types::ClientEvent::CloseStream => {
                        match serde_json::to_string(&types::ControlMessage { kind: "CloseStream" })
                        {
                            Ok(text) => Message::Text(text),
                            Err(e) => {
                                tracing::error!("failed to serialize close: {}", e);
                                continue;
                            }
                        }
                    }
                };
                if let Err(e) = write.send(message).await {
                    tracing::error!("failed to send message: {}", e);
                }
            }
        });

        // Reader: parse result frames and broadcast transcript events.
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<types::ResultFrame>(&text) {
                            Ok(frame) => {
                                if frame.kind != "Results" {
                                    tracing::debug!("ignoring frame: {}", frame.kind);
                                    continue;
                                }
                                let transcript = frame
                                    .transcript()
                                    .map(str::trim)
                                    .unwrap_or_default()
                                    .to_string();
                                if transcript.is_empty() {
                                    continue;
                                }
                                let event = types::ServerEvent::Transcript {
                                    text: transcript,
                                    is_final: frame.is_final,
                                };
                                if let Err(e) = s_tx.send(event) {
                                    tracing::error!("failed to send event: {}", e);
                                }
                            }
                            Err(e) => {
                                tracing::error!("failed to deserialize frame: {}, text=> {:?}", e, text);
                            }
                        }
                    }
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        let close_event = types::ServerEvent::Closed {
                            reason: reason.map(|v| format!("{:?}", v)),
                        };
                        if let Err(e) = s_tx.send(close_event) {
                            tracing::error!("failed to send close event: {}", e);
                        }
                        break;
                    }
                    _ => {}
                }
            }
            drop(c_tx);
            drop(s_tx);
        });

        // Heartbeat so an idle connection is not dropped by the server.
        let keep_alive_tx = self
            .c_tx
            .as_ref()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("not connected yet"))?;
        self.keep_alive = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(consts::KEEP_ALIVE_PERIOD);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if keep_alive_tx
                    .send(types::ClientEvent::KeepAlive)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }));

        Ok(())
    }

    /// Subscribe to incoming transcript events.
    pub fn server_events(&self) -> Result<ServerRx> {
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    /// Send one chunk of raw PCM16 audio.
    pub async fn send_audio(&self, chunk: Vec<u8>) -> Result<()> {
        match self.c_tx {
            Some(ref tx) => {
                tx.send(types::ClientEvent::Audio(chunk)).await?;
                Ok(())
            }
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    /// Tear the connection down. Cancels the heartbeat first, then asks the
    /// server to close the stream. Calling this twice, or before `connect`
    /// ever succeeded, is a no-op.
    pub async fn disconnect(&mut self) {
        if let Some(handle) = self.keep_alive.take() {
            handle.abort();
        }
        if let Some(tx) = self.c_tx.take() {
            if tx.send(types::ClientEvent::CloseStream).await.is_err() {
                tracing::debug!("connection already gone at close");
            }
        }
        self.s_tx = None;
    }

    pub fn is_connected(&self) -> bool {
        self.c_tx.is_some()
    }
}

/// Connect with a specific configuration.
pub async fn connect_with_config(capacity: usize, config: config::Config) -> Result<Client> {
    let mut client = Client::new(capacity, config);
    client.connect().await?;
    Ok(client)
}

/// Connect with default settings, reading the API key from the environment.
pub async fn connect() -> Result<Client> {
    let config = config::Config::new();
    connect_with_config(1024, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        // A client that never connected: both calls must be harmless.
        let mut client = Client::new(8, config::Config::new());
        assert!(!client.is_connected());
        client.disconnect().await;
        client.disconnect().await;
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn server_events_requires_connection() {
        let client = Client::new(8, config::Config::new());
        assert!(client.server_events().is_err());
    }

    #[tokio::test]
    async fn send_audio_requires_connection() {
        let client = Client::new(8, config::Config::new());
        assert!(client.send_audio(vec![0, 0]).await.is_err());
    }
}
