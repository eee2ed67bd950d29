//! Board API abstraction.
//!
//! The engine talks to the backing server through the [`BoardApi`] trait:
//! one read endpoint returning the full board, one mutation endpoint
//! applying a partial move patch to a task. [`memory::InMemoryBoardApi`]
//! provides a loopback implementation for tests and local development.

pub mod memory;

use std::future::Future;

use syncboard_proto::board::{Board, BoardId, MovePatch, Task, TaskId};

/// Errors from board API calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// Transport-level failure; the request may not have reached the
    /// server at all.
    #[error("network error: {0}")]
    Network(String),

    /// The server received the request and refused it.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The referenced task does not exist on the server.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// The referenced board does not exist on the server.
    #[error("board not found: {0}")]
    BoardNotFound(BoardId),
}

/// Server endpoints the sync engine depends on.
pub trait BoardApi: Send + Sync {
    /// Fetches the complete board: all status columns and all tasks.
    fn fetch_board(
        &self,
        board_id: BoardId,
    ) -> impl Future<Output = Result<Board, ApiError>> + Send;

    /// Applies a partial update to a task's status and/or order.
    ///
    /// Returns the full task record as the server now holds it, which
    /// may differ from what the patch requested (the server owns order
    /// assignment).
    fn move_task(
        &self,
        task_id: TaskId,
        patch: MovePatch,
    ) -> impl Future<Output = Result<Task, ApiError>> + Send;
}
