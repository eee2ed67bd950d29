//! Shared data model and wire protocol definitions for Syncboard.

pub mod board;
pub mod event;
pub mod hub;
