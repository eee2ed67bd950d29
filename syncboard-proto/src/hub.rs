//! Hub wire protocol for the Syncboard notification channel.
//!
//! Defines the [`HubMessage`] enum that is postcard-encoded and sent
//! over WebSocket binary frames between hub clients and the hub server.
//!
//! The hub protocol is deliberately small: clients subscribe to named
//! channels, publish named events on them, and receive every event
//! published on a channel they are subscribed to. The hub never inspects
//! event payloads and keeps no backlog — events published while a
//! subscriber is disconnected are gone for good, which is why clients
//! force a refetch after every resubscribe.

use serde::{Deserialize, Serialize};

use crate::event::BoardEvent;

/// Messages exchanged between hub clients and the hub server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubMessage {
    /// Client subscribes to a named channel.
    ///
    /// Must be the first message sent after the WebSocket connection.
    /// The server responds with [`HubMessage::Subscribed`]. Further
    /// `Subscribe` messages on the same connection add channels.
    Subscribe {
        /// The channel name, e.g. `board-{boardId}`.
        channel: String,
    },

    /// Server acknowledges a subscription.
    Subscribed {
        /// The channel that was subscribed (echoed back).
        channel: String,
    },

    /// Client publishes an event on a channel.
    Publish {
        /// The channel to publish on.
        channel: String,
        /// The named event.
        event: BoardEvent,
        /// Opaque payload; never inspected by the hub or by consumers.
        payload: Vec<u8>,
    },

    /// Server delivers an event to a subscriber.
    Event {
        /// The channel the event was published on.
        channel: String,
        /// The named event.
        event: BoardEvent,
        /// Opaque payload, forwarded verbatim.
        payload: Vec<u8>,
    },

    /// Server reports an error condition.
    Error {
        /// Human-readable error description.
        reason: String,
    },
}

/// Encodes a [`HubMessage`] into bytes using postcard.
///
/// # Errors
///
/// Returns an error string if serialization fails.
pub fn encode(msg: &HubMessage) -> Result<Vec<u8>, String> {
    postcard::to_allocvec(msg).map_err(|e| format!("hub encode error: {e}"))
}

/// Decodes a [`HubMessage`] from bytes using postcard.
///
/// # Errors
///
/// Returns an error string if deserialization fails.
pub fn decode(bytes: &[u8]) -> Result<HubMessage, String> {
    postcard::from_bytes(bytes).map_err(|e| format!("hub decode error: {e}"))
}
