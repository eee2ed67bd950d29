//! WebSocket channel client for the Syncboard hub.
//!
//! Implements [`ChannelClient`] over a WebSocket connection to the hub
//! server. Subscriptions are acknowledged by the hub before they take
//! effect; events arrive as postcard-encoded binary frames routed by a
//! background reader task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use syncboard_proto::event::BoardEvent;
use syncboard_proto::hub::{self, HubMessage};

use super::{ChannelClient, ChannelConnector, ChannelError, ChannelEvent};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Default timeout for connecting to the hub server.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for waiting for a `Subscribed` acknowledgment.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket connection to the hub implementing [`ChannelClient`].
///
/// Created via [`WsChannelClient::connect`], which establishes the
/// WebSocket connection and spawns a background reader task. The reader
/// routes `Subscribed` acknowledgments to pending [`subscribe`] calls and
/// `Event` frames to [`next_event`].
///
/// [`subscribe`]: ChannelClient::subscribe
/// [`next_event`]: ChannelClient::next_event
pub struct WsChannelClient {
    /// Write half of the WebSocket connection (shared for concurrent sends).
    ws_sender: Arc<Mutex<WsSender>>,
    /// Subscription acknowledgments from the background reader task.
    acks: Mutex<mpsc::Receiver<String>>,
    /// Events from the background reader task.
    events: Mutex<mpsc::Receiver<ChannelEvent>>,
    /// Whether the WebSocket connection to the hub is active.
    connected: Arc<AtomicBool>,
    /// Handle to the background reader task (kept alive for the client's lifetime).
    _reader_handle: tokio::task::JoinHandle<()>,
}

impl WsChannelClient {
    /// Connect to a hub server.
    ///
    /// Establishes the WebSocket connection (10s timeout) and spawns the
    /// background reader. No subscription is made yet; the hub expects a
    /// `Subscribe` as the first message, so callers must subscribe before
    /// expecting any events.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Timeout`] if the connection times out.
    /// - [`ChannelError::Io`] if the hub URL cannot be resolved or
    ///   connected.
    pub async fn connect(hub_url: &str) -> Result<Self, ChannelError> {
        let (ws_stream, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(hub_url))
            .await
            .map_err(|_| {
                tracing::warn!(url = hub_url, "hub WebSocket connect timed out");
                ChannelError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url = hub_url, err = %e, "hub WebSocket connect failed");
                map_ws_connect_error(e)
            })?;

        let (ws_sender, ws_reader) = ws_stream.split();

        let (acks_tx, acks_rx) = mpsc::channel(16);
        let (events_tx, events_rx) = mpsc::channel(256);
        let connected = Arc::new(AtomicBool::new(true));
        let reader_connected = Arc::clone(&connected);

        let reader_handle = tokio::spawn(reader_loop(ws_reader, acks_tx, events_tx, reader_connected));

        Ok(Self {
            ws_sender: Arc::new(Mutex::new(ws_sender)),
            acks: Mutex::new(acks_rx),
            events: Mutex::new(events_rx),
            connected,
            _reader_handle: reader_handle,
        })
    }

    /// Publishes an event on a channel.
    ///
    /// Used by backends and tests; the sync engine itself only consumes.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Closed`] if the hub connection is down.
    /// - [`ChannelError::Io`] for encoding or WebSocket send failures.
    pub async fn publish(
        &self,
        channel: &str,
        event: BoardEvent,
        payload: Vec<u8>,
    ) -> Result<(), ChannelError> {
        let msg = HubMessage::Publish {
            channel: channel.to_string(),
            event,
            payload,
        };
        self.send_msg(&msg).await
    }

    async fn send_msg(&self, msg: &HubMessage) -> Result<(), ChannelError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(ChannelError::Closed);
        }
        let bytes = hub::encode(msg).map_err(|e| ChannelError::Io(std::io::Error::other(e)))?;
        let mut sender = self.ws_sender.lock().await;
        sender
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| {
                tracing::warn!(err = %e, "hub send failed");
                self.connected.store(false, Ordering::Relaxed);
                ChannelError::Closed
            })?;
        Ok(())
    }
}

impl ChannelClient for WsChannelClient {
    /// Subscribe to a channel and wait for the hub's acknowledgment.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Timeout`] if no acknowledgment arrives in time.
    /// - [`ChannelError::Closed`] if the connection drops while waiting.
    async fn subscribe(&self, channel: &str) -> Result<(), ChannelError> {
        self.send_msg(&HubMessage::Subscribe {
            channel: channel.to_string(),
        })
        .await?;

        let mut acks = self.acks.lock().await;
        let deadline = tokio::time::Instant::now() + SUBSCRIBE_TIMEOUT;
        loop {
            let ack = tokio::time::timeout_at(deadline, acks.recv())
                .await
                .map_err(|_| {
                    tracing::warn!(channel = %channel, "subscription acknowledgment timed out");
                    ChannelError::Timeout
                })?;
            match ack {
                Some(acked) if acked == channel => {
                    tracing::debug!(channel = %channel, "subscription acknowledged");
                    return Ok(());
                }
                Some(other) => {
                    // Ack for an earlier subscribe on this connection.
                    tracing::debug!(channel = %other, "ignoring stale subscription ack");
                }
                None => return Err(ChannelError::Closed),
            }
        }
    }

    /// Receive the next event from any subscribed channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] once the connection is lost and
    /// all buffered events have been drained.
    async fn next_event(&self) -> Result<ChannelEvent, ChannelError> {
        let mut events = self.events.lock().await;
        events.recv().await.ok_or(ChannelError::Closed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Background task that reads WebSocket frames and dispatches them.
///
/// Routes `Subscribed` acks and `Event` deliveries into their channels.
/// Malformed frames are logged and skipped; the task only exits when the
/// WebSocket closes or errors out, at which point `connected` flips off.
async fn reader_loop(
    mut ws_reader: WsReader,
    acks: mpsc::Sender<String>,
    events: mpsc::Sender<ChannelEvent>,
    connected: Arc<AtomicBool>,
) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Binary(data)) => match hub::decode(&data) {
                Ok(HubMessage::Subscribed { channel }) => {
                    if acks.send(channel).await.is_err() {
                        break;
                    }
                }
                Ok(HubMessage::Event {
                    channel,
                    event,
                    payload,
                }) => {
                    let delivery = ChannelEvent {
                        channel,
                        event,
                        payload,
                    };
                    if events.send(delivery).await.is_err() {
                        // Receiver dropped, client is gone.
                        break;
                    }
                }
                Ok(HubMessage::Error { reason }) => {
                    tracing::warn!(reason = %reason, "hub server error");
                }
                Ok(other) => {
                    tracing::debug!(?other, "unexpected hub message type");
                }
                Err(e) => {
                    // Malformed frame: log and skip, don't disconnect.
                    tracing::warn!(err = %e, "malformed hub frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("hub WebSocket closed by server");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Text(_) | Message::Frame(_)) => {
                // Ignore control and text frames.
            }
            Err(e) => {
                tracing::warn!(err = %e, "hub WebSocket read error");
                break;
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
    tracing::debug!("hub reader task exiting");
}

/// Map a `tokio_tungstenite` connection error to a [`ChannelError`].
fn map_ws_connect_error(err: tokio_tungstenite::tungstenite::Error) -> ChannelError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => ChannelError::Io(io_err),
        WsError::Http(response) => ChannelError::Io(std::io::Error::other(format!(
            "hub HTTP error: status {}",
            response.status()
        ))),
        other => ChannelError::Io(std::io::Error::other(format!(
            "hub connection error: {other}"
        ))),
    }
}

/// Connector producing [`WsChannelClient`]s for a fixed hub URL.
#[derive(Debug, Clone)]
pub struct WsConnector {
    hub_url: String,
}

impl WsConnector {
    /// Creates a connector for the given hub URL (`ws://` or `wss://`).
    #[must_use]
    pub fn new(hub_url: impl Into<String>) -> Self {
        Self {
            hub_url: hub_url.into(),
        }
    }

    /// The hub URL this connector dials.
    #[must_use]
    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }
}

impl ChannelConnector for WsConnector {
    type Client = WsChannelClient;

    async fn connect(&self) -> Result<Self::Client, ChannelError> {
        WsChannelClient::connect(&self.hub_url).await
    }
}
