//! Realtime bridge: hub subscription with automatic reconnect.
//!
//! Defines the [`ChannelClient`] trait over pub/sub channel connections.
//! Concrete implementations:
//! - [`loopback::LoopbackChannelClient`] — in-process channels for testing
//! - [`ws::WsChannelClient`] — WebSocket connection to the hub server
//!
//! The [`RealtimeBridge`] supervises a connection: it subscribes to the
//! board's channel, turns every received event into a refetch trigger,
//! and reconnects with exponential backoff when the connection drops.
//! Event payloads are treated as opaque; the snapshot is always repaired
//! by refetching, never by interpreting pushed data.

pub mod loopback;
pub mod ws;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use syncboard_proto::event::{BoardEvent, board_channel};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::ClientEvent;
use crate::recon::ReconcileScheduler;

/// Errors from channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The connection to the hub has been closed.
    #[error("channel connection closed")]
    Closed,

    /// The operation timed out before completing.
    #[error("channel operation timed out")]
    Timeout,

    /// The hub refused the subscription.
    #[error("subscription rejected: {0}")]
    Subscribe(String),

    /// An underlying I/O error occurred.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A change notification received from the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    /// Channel the event arrived on.
    pub channel: String,
    /// What kind of change occurred.
    pub event: BoardEvent,
    /// Opaque payload. The bridge never interprets it.
    pub payload: Vec<u8>,
}

/// An established pub/sub connection to the hub.
pub trait ChannelClient: Send + Sync {
    /// Subscribes to a channel, awaiting the hub's acknowledgment.
    fn subscribe(
        &self,
        channel: &str,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Receives the next event from any subscribed channel.
    ///
    /// Blocks asynchronously until an event arrives or the connection
    /// is lost.
    fn next_event(&self) -> impl Future<Output = Result<ChannelEvent, ChannelError>> + Send;

    /// Whether the underlying connection is still up.
    fn is_connected(&self) -> bool;
}

/// Factory for channel connections, used by the bridge to reconnect.
pub trait ChannelConnector: Send + Sync + 'static {
    /// The client type this connector produces.
    type Client: ChannelClient + Send + Sync + 'static;

    /// Establishes a fresh connection to the hub.
    fn connect(&self) -> impl Future<Output = Result<Self::Client, ChannelError>> + Send;
}

/// Backoff policy for reconnecting to the hub.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt.
    pub initial: Duration,
    /// Ceiling on the delay between attempts.
    pub max: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            max: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// The delay to use after the current one.
    fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max)
    }
}

/// Handle to a running bridge supervisor. Dropping it stops the bridge.
#[derive(Debug)]
pub struct BridgeHandle {
    task: JoinHandle<()>,
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns a bridge supervising the subscription for one board.
///
/// On every successful (re)connect the bridge subscribes to the board's
/// channel, reports connectivity, and schedules a forced refetch: the hub
/// keeps no backlog, so any events missed while disconnected can only be
/// recovered by refetching. Each event received thereafter schedules a
/// further refetch.
pub fn spawn_bridge<C: ChannelConnector>(
    connector: C,
    board_id: syncboard_proto::board::BoardId,
    scheduler: ReconcileScheduler,
    events: mpsc::Sender<ClientEvent>,
    config: ReconnectConfig,
) -> BridgeHandle {
    let channel = board_channel(&board_id);
    let task = tokio::spawn(supervise(connector, channel, scheduler, events, config));
    BridgeHandle { task }
}

async fn supervise<C: ChannelConnector>(
    connector: C,
    channel: String,
    scheduler: ReconcileScheduler,
    events: mpsc::Sender<ClientEvent>,
    config: ReconnectConfig,
) {
    let connector = Arc::new(connector);
    let mut delay = config.initial;

    loop {
        match connect_and_subscribe(connector.as_ref(), &channel).await {
            Ok(client) => {
                tracing::info!(channel = %channel, "subscribed to board channel");
                delay = config.initial;
                let _ = events.send(ClientEvent::ChannelStatus { connected: true }).await;
                // Anything published while we were away is gone; refetch.
                scheduler.schedule_refetch();

                consume_events(&client, &channel, &scheduler).await;

                tracing::warn!(channel = %channel, "board channel connection lost");
                let _ = events
                    .send(ClientEvent::ChannelStatus { connected: false })
                    .await;
            }
            Err(error) => {
                tracing::warn!(channel = %channel, %error, "board channel connect failed");
            }
        }

        tokio::time::sleep(delay).await;
        delay = config.next_delay(delay);
    }
}

async fn connect_and_subscribe<C: ChannelConnector>(
    connector: &C,
    channel: &str,
) -> Result<C::Client, ChannelError> {
    let client = connector.connect().await?;
    client.subscribe(channel).await?;
    Ok(client)
}

/// Pulls events until the connection drops. Every event, whatever its
/// kind or payload, means the snapshot may be stale.
async fn consume_events<T: ChannelClient>(
    client: &T,
    channel: &str,
    scheduler: &ReconcileScheduler,
) {
    loop {
        match client.next_event().await {
            Ok(event) => {
                tracing::debug!(
                    channel = %channel,
                    event = %event.event,
                    "board change notification received"
                );
                scheduler.schedule_refetch();
            }
            Err(error) => {
                tracing::debug!(channel = %channel, %error, "channel read failed");
                return;
            }
        }
    }
}
