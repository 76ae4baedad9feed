// ============================
// crates/client/src/transport.rs
// ============================
//! Socket transport used by the chat session.
use crate::error::{ClientError, ClientResult};
use chatter_common::{ClientEvent, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Outbound half of a connection. Sends never block; a dead connection is a
/// `ClientError::Transport`.
pub trait Transport: Send {
    fn send(&self, event: ClientEvent) -> ClientResult<()>;

    /// Flush queued events, then close the connection
    fn close(&self);
}

/// Decoded server events of one connection
pub type EventStream = mpsc::UnboundedReceiver<ServerEvent>;

enum Outgoing {
    Event(ClientEvent),
    Close,
}

/// tokio-tungstenite connection: a writer task drains the outbound queue and a
/// reader task decodes frames into an [`EventStream`].
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Outgoing>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl WsTransport {
    /// Connect to `url` (e.g. `ws://127.0.0.1:3000/ws`)
    pub async fn connect(url: &str) -> ClientResult<(Self, EventStream)> {
        let (socket, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut sink, mut stream) = socket.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Outgoing>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(async move {
            while let Some(outgoing) = outbound_rx.recv().await {
                match outgoing {
                    Outgoing::Event(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!("Dropping unserializable event: {e}");
                                continue;
                            },
                        };
                        if sink.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    },
                    Outgoing::Close => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    },
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerEvent>(text.as_str()) {
                            Ok(event) => {
                                if events_tx.send(event).is_err() {
                                    break;
                                }
                            },
                            Err(e) => warn!("Ignoring unreadable server frame: {e}"),
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {},
                    Err(e) => {
                        debug!("Socket read error: {e}");
                        break;
                    },
                }
            }
        });

        debug!("Connected to {url}");
        Ok((
            Self {
                outbound,
                writer,
                reader,
            },
            events_rx,
        ))
    }

    /// True once the writer has stopped
    pub fn is_closed(&self) -> bool {
        self.writer.is_finished()
    }
}

impl Transport for WsTransport {
    fn send(&self, event: ClientEvent) -> ClientResult<()> {
        self.outbound
            .send(Outgoing::Event(event))
            .map_err(|_| ClientError::Transport("connection closed".to_string()))
    }

    fn close(&self) {
        let _ = self.outbound.send(Outgoing::Close);
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
