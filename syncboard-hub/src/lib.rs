//! Syncboard notification hub library.
//!
//! Exposes the hub server for use in tests and embedding. The hub accepts
//! WebSocket connections, registers channel subscriptions, and fans out
//! published events to every current subscriber of a channel. It carries
//! no backlog: events published while a subscriber is disconnected are
//! not replayed.

pub mod config;
pub mod hub;
