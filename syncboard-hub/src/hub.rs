//! Hub server core: shared state, WebSocket handler, channel registry, and
//! event fan-out.
//!
//! The hub accepts WebSocket connections, registers subscriptions by
//! channel name, and forwards every event published on a channel to all of
//! that channel's current subscribers. Payloads are opaque — the hub never
//! inspects them. There is no store-and-forward: a subscriber that is
//! offline when an event is published never sees it, and must recover by
//! refetching after it resubscribes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use syncboard_proto::event::BoardEvent;
use syncboard_proto::hub::{self, HubMessage};
use tokio::sync::{RwLock, mpsc};

/// Default maximum allowed channel name length in bytes.
const DEFAULT_MAX_CHANNEL_NAME_LEN: usize = 256;

/// Default maximum allowed event payload size in bytes (64 KB).
const DEFAULT_MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Shared hub state holding the channel registry.
pub struct HubState {
    /// Channel name -> (connection id -> writer-channel sender).
    channels: RwLock<HashMap<String, HashMap<u64, mpsc::UnboundedSender<Message>>>>,
    /// Monotonic connection id source.
    next_conn_id: AtomicU64,
    /// Maximum allowed channel name length in bytes.
    max_channel_name_len: usize,
    /// Maximum allowed event payload size in bytes.
    max_payload_size: usize,
}

impl Default for HubState {
    fn default() -> Self {
        Self::new()
    }
}

impl HubState {
    /// Creates a new hub state with an empty channel registry and default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            next_conn_id: AtomicU64::new(0),
            max_channel_name_len: DEFAULT_MAX_CHANNEL_NAME_LEN,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }

    /// Creates a new hub state with custom limits.
    #[must_use]
    pub fn with_config(max_channel_name_len: usize, max_payload_size: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            next_conn_id: AtomicU64::new(0),
            max_channel_name_len,
            max_payload_size,
        }
    }

    /// Allocates a fresh connection id.
    fn alloc_conn_id(&self) -> u64 {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Adds a subscriber to a channel.
    async fn subscribe(&self, channel: &str, conn_id: u64, sender: mpsc::UnboundedSender<Message>) {
        let mut channels = self.channels.write().await;
        channels
            .entry(channel.to_string())
            .or_default()
            .insert(conn_id, sender);
    }

    /// Removes a connection from every channel it subscribed to.
    ///
    /// Empty channels are dropped from the registry.
    async fn unsubscribe_all(&self, conn_id: u64) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, subs| {
            subs.remove(&conn_id);
            !subs.is_empty()
        });
    }

    /// Fans out an event to all current subscribers of a channel.
    ///
    /// Returns the number of subscribers the event was handed to. Senders
    /// whose connection is gone are skipped (cleanup happens on disconnect).
    pub async fn publish(&self, channel: &str, event: BoardEvent, payload: Vec<u8>) -> usize {
        let msg = HubMessage::Event {
            channel: channel.to_string(),
            event,
            payload,
        };
        let Ok(bytes) = hub::encode(&msg) else {
            tracing::error!(channel = %channel, event = %event, "failed to encode event");
            return 0;
        };

        let channels = self.channels.read().await;
        let Some(subs) = channels.get(channel) else {
            return 0;
        };

        let mut delivered = 0;
        for sender in subs.values() {
            if sender.send(Message::Binary(bytes.clone().into())).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Returns the number of current subscribers of a channel.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let channels = self.channels.read().await;
        channels.get(channel).map_or(0, HashMap::len)
    }

    /// Send a WebSocket Close frame to all connected subscribers.
    ///
    /// This causes each subscriber's writer task to send a close frame,
    /// which triggers client-side disconnect detection. Useful for graceful
    /// shutdown and for testing reconnect behavior.
    pub async fn close_all_connections(&self) {
        let channels = self.channels.read().await;
        for (channel, subs) in channels.iter() {
            for sender in subs.values() {
                tracing::info!(channel = %channel, "sending close frame to subscriber");
                let _ = sender.send(Message::Close(None));
            }
        }
    }
}

/// Handles an upgraded WebSocket connection for a single subscriber.
///
/// The connection lifecycle:
/// 1. Wait for an initial `Subscribe` message.
/// 2. Register the subscription and send `Subscribed` back.
/// 3. Enter the message loop, handling further `Subscribe` and `Publish`
///    messages.
/// 4. On disconnect, drop every subscription held by this connection.
pub async fn handle_socket(socket: WebSocket, state: Arc<HubState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Wait for the initial Subscribe message.
    let Some(first_channel) = wait_for_subscribe(&mut ws_receiver, &mut ws_sender, &state).await
    else {
        tracing::warn!("connection closed before first subscription");
        return;
    };

    let conn_id = state.alloc_conn_id();
    tracing::info!(conn_id, channel = %first_channel, "subscriber registering");

    // Channel feeding this connection's WebSocket writer.
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    state.subscribe(&first_channel, conn_id, tx.clone()).await;

    // Send Subscribed acknowledgment.
    let ack = HubMessage::Subscribed {
        channel: first_channel.clone(),
    };
    if let Err(e) = send_hub_msg(&mut ws_sender, &ack).await {
        tracing::error!(conn_id, error = %e, "failed to send Subscribed ack");
        state.unsubscribe_all(conn_id).await;
        return;
    }

    // Writer task: forward messages from the channel to the WebSocket.
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(conn_id, "WebSocket write failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Reader task: process further messages from this connection.
    let reader_state = Arc::clone(&state);
    let reader_tx = tx;
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    handle_binary_message(conn_id, &data, &reader_state, &reader_tx).await;
                }
                Message::Close(_) => {
                    tracing::info!(conn_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    // Clean up: drop all of this connection's subscriptions.
    state.unsubscribe_all(conn_id).await;
    tracing::info!(conn_id, "subscriber disconnected and unregistered");
}

/// Waits for the first message on the WebSocket, expecting a `Subscribe`.
///
/// Returns the channel name if a valid `Subscribe` is received, or `None`
/// if the connection closes or an invalid message arrives. An invalid
/// channel name gets the same `Error` reply it would get after the
/// handshake, before the connection is dropped.
async fn wait_for_subscribe(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
    sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    state: &Arc<HubState>,
) -> Option<String> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Binary(data) => match hub::decode(&data) {
                Ok(HubMessage::Subscribe { channel }) => {
                    if channel.is_empty() || channel.len() > state.max_channel_name_len {
                        tracing::warn!(len = channel.len(), "rejecting invalid channel name");
                        let err = HubMessage::Error {
                            reason: "invalid channel name".to_string(),
                        };
                        if let Err(e) = send_hub_msg(sender, &err).await {
                            tracing::warn!(error = %e, "failed to send Error reply");
                        }
                        return None;
                    }
                    return Some(channel);
                }
                Ok(other) => {
                    tracing::warn!(msg = ?other, "expected Subscribe, got different message");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode subscription message");
                    return None;
                }
            },
            Message::Close(_) => return None,
            _ => {
                // Skip non-binary frames (ping/pong) during the handshake.
            }
        }
    }
    None
}

/// Handles a binary WebSocket message from a registered connection.
async fn handle_binary_message(
    conn_id: u64,
    data: &[u8],
    state: &Arc<HubState>,
    tx: &mpsc::UnboundedSender<Message>,
) {
    let msg = match hub::decode(data) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(conn_id, error = %e, "failed to decode message");
            return;
        }
    };

    match msg {
        HubMessage::Subscribe { channel } => {
            if channel.is_empty() || channel.len() > state.max_channel_name_len {
                send_error(tx, "invalid channel name");
                return;
            }
            state.subscribe(&channel, conn_id, tx.clone()).await;
            let ack = HubMessage::Subscribed {
                channel: channel.clone(),
            };
            if let Ok(bytes) = hub::encode(&ack) {
                let _ = tx.send(Message::Binary(bytes.into()));
            }
            tracing::info!(conn_id, channel = %channel, "additional subscription");
        }
        HubMessage::Publish {
            channel,
            event,
            payload,
        } => {
            if payload.len() > state.max_payload_size {
                tracing::warn!(
                    conn_id,
                    size = payload.len(),
                    max = state.max_payload_size,
                    "payload exceeds size limit"
                );
                send_error(tx, "payload too large");
                return;
            }
            let delivered = state.publish(&channel, event, payload).await;
            tracing::debug!(
                conn_id,
                channel = %channel,
                event = %event,
                delivered,
                "event published"
            );
        }
        other => {
            tracing::warn!(conn_id, msg = ?other, "unexpected message type from client");
        }
    }
}

/// Queues an `Error` message for a connection.
fn send_error(tx: &mpsc::UnboundedSender<Message>, reason: &str) {
    let err = HubMessage::Error {
        reason: reason.to_string(),
    };
    if let Ok(bytes) = hub::encode(&err) {
        let _ = tx.send(Message::Binary(bytes.into()));
    }
}

/// Sends a hub message on a WebSocket sender half.
async fn send_hub_msg(
    sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    msg: &HubMessage,
) -> Result<(), String> {
    let bytes = hub::encode(msg)?;
    sender
        .send(Message::Binary(bytes.into()))
        .await
        .map_err(|e| format!("WebSocket send failed: {e}"))
}

/// Starts the hub server with default state.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(HubState::new())).await
}

/// Starts the hub server with a pre-configured [`HubState`].
///
/// Use [`HubState::with_config`] to create a state with custom limits from
/// the resolved [`crate::config::HubConfig`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<HubState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "hub server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<HubState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
