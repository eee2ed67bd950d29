//! In-process pub/sub channels for testing.
//!
//! [`LoopbackHub`] fans events out to subscribed [`LoopbackChannelClient`]s
//! through unbounded in-memory channels, with no sockets involved. Tests
//! use it to drive the bridge supervisor deterministically, including
//! simulated connection loss.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;
use syncboard_proto::event::BoardEvent;
use tokio::sync::mpsc;

use super::{ChannelClient, ChannelConnector, ChannelError, ChannelEvent};

/// Sender side of every connected client, keyed by connection id, plus
/// the channel subscription table. The hub holds the only strong sender
/// for each client, so dropping it closes that client's event stream.
#[derive(Debug, Default)]
struct HubInner {
    senders: HashMap<u64, mpsc::UnboundedSender<ChannelEvent>>,
    channels: HashMap<String, Vec<u64>>,
}

/// In-process hub shared between loopback clients.
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    inner: Arc<Mutex<HubInner>>,
    next_id: Arc<AtomicU64>,
}

impl LoopbackHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client connected to this hub.
    #[must_use]
    pub fn client(&self) -> LoopbackChannelClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().senders.insert(id, tx);
        LoopbackChannelClient {
            hub: self.clone(),
            id,
            events: tokio::sync::Mutex::new(rx),
        }
    }

    /// Publishes an event to every subscriber of a channel.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, channel: &str, event: BoardEvent, payload: Vec<u8>) -> usize {
        let mut inner = self.inner.lock();
        let HubInner { senders, channels } = &mut *inner;
        let Some(ids) = channels.get_mut(channel) else {
            return 0;
        };
        // Prune clients whose receiver side is gone.
        ids.retain(|id| senders.get(id).is_some_and(|tx| !tx.is_closed()));
        let mut delivered = 0;
        for id in ids.iter() {
            if let Some(tx) = senders.get(id) {
                let sent = tx.send(ChannelEvent {
                    channel: channel.to_string(),
                    event,
                    payload: payload.clone(),
                });
                if sent.is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Severs every connection: clients observe a closed stream on their
    /// next read, as if the hub had gone away.
    pub fn disconnect_all(&self) {
        let mut inner = self.inner.lock();
        inner.senders.clear();
        inner.channels.clear();
    }

    /// Number of live subscribers on a channel.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        let inner = self.inner.lock();
        inner.channels.get(channel).map_or(0, |ids| {
            ids.iter()
                .filter(|id| inner.senders.get(id).is_some_and(|tx| !tx.is_closed()))
                .count()
        })
    }
}

/// Channel client backed by a [`LoopbackHub`].
pub struct LoopbackChannelClient {
    hub: LoopbackHub,
    id: u64,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<ChannelEvent>>,
}

impl ChannelClient for LoopbackChannelClient {
    async fn subscribe(&self, channel: &str) -> Result<(), ChannelError> {
        let mut inner = self.hub.inner.lock();
        if !inner.senders.contains_key(&self.id) {
            return Err(ChannelError::Closed);
        }
        let ids = inner.channels.entry(channel.to_string()).or_default();
        if !ids.contains(&self.id) {
            ids.push(self.id);
        }
        Ok(())
    }

    async fn next_event(&self) -> Result<ChannelEvent, ChannelError> {
        let mut events = self.events.lock().await;
        events.recv().await.ok_or(ChannelError::Closed)
    }

    fn is_connected(&self) -> bool {
        self.hub.inner.lock().senders.contains_key(&self.id)
    }
}

/// Connector producing loopback clients, with optional failure injection.
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    hub: LoopbackHub,
    fail_next: Arc<AtomicU32>,
}

impl LoopbackConnector {
    /// Creates a connector for the given hub.
    #[must_use]
    pub fn new(hub: LoopbackHub) -> Self {
        Self {
            hub,
            fail_next: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Makes the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }
}

impl ChannelConnector for LoopbackConnector {
    type Client = LoopbackChannelClient;

    async fn connect(&self) -> Result<Self::Client, ChannelError> {
        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ChannelError::Io(std::io::Error::other(
                "injected connect failure",
            )));
        }
        Ok(self.hub.client())
    }
}
