//! Syncboard — client-side board ordering and synchronization engine.
//!
//! Maintains a per-column ordering of tasks while applying local
//! speculative moves, reconciling them against authoritative server
//! responses, and absorbing change notifications pushed from other
//! clients over a publish/subscribe channel.

pub mod api;
pub mod bridge;
pub mod client;
pub mod config;
pub mod filter;
pub mod moves;
pub mod patcher;
pub mod recon;
pub mod snapshot;
