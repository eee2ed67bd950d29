//! Loopback board API backed by in-process state.
//!
//! Implements the server's move semantics faithfully enough for the
//! engine's tests: the server owns order assignment, so a proposed order
//! that collides with an existing task in the target column is replaced
//! with one past the column's maximum. Gaps left by departures are never
//! compacted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use syncboard_proto::board::{Board, BoardId, MovePatch, Task, TaskId};
use syncboard_proto::event::BoardEvent;

use super::{ApiError, BoardApi};

type ChangeHook = dyn Fn(BoardId, BoardEvent) + Send + Sync;

/// In-process [`BoardApi`] for tests and local development.
///
/// Holds boards in a mutex-guarded map. Failure injection knobs make the
/// next N calls of an endpoint fail with a network error, and an optional
/// artificial latency delays fetches so races between fetch and move can
/// be exercised deterministically.
#[derive(Default)]
pub struct InMemoryBoardApi {
    boards: Mutex<HashMap<BoardId, Board>>,
    fail_next_fetches: AtomicU32,
    fail_next_moves: AtomicU32,
    fetch_latency: Mutex<Option<Duration>>,
    change_hook: Mutex<Option<Arc<ChangeHook>>>,
}

impl InMemoryBoardApi {
    /// Creates an empty API with no boards.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a board.
    pub fn put_board(&self, board: Board) {
        self.boards.lock().insert(board.id, board);
    }

    /// Returns a copy of a board's current server-side state.
    #[must_use]
    pub fn board(&self, board_id: BoardId) -> Option<Board> {
        self.boards.lock().get(&board_id).cloned()
    }

    /// Mutates a task in place, as another client acting through the
    /// server would. Fires the change hook with the given event.
    ///
    /// Returns false if the task is unknown.
    pub fn update_task(
        &self,
        task_id: TaskId,
        event: BoardEvent,
        mutate: impl FnOnce(&mut Task),
    ) -> bool {
        let board_id = {
            let mut boards = self.boards.lock();
            let Some((board_id, task)) = boards.values_mut().find_map(|board| {
                let id = board.id;
                board.tasks.iter_mut().find(|t| t.id == task_id).map(|t| (id, t))
            }) else {
                return false;
            };
            mutate(task);
            board_id
        };
        self.fire_hook(board_id, event);
        true
    }

    /// Makes the next `count` fetches fail with a network error.
    pub fn fail_next_fetches(&self, count: u32) {
        self.fail_next_fetches.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` moves fail with a network error.
    pub fn fail_next_moves(&self, count: u32) {
        self.fail_next_moves.store(count, Ordering::SeqCst);
    }

    /// Delays every fetch by the given duration. `None` removes the delay.
    pub fn set_fetch_latency(&self, latency: Option<Duration>) {
        *self.fetch_latency.lock() = latency;
    }

    /// Registers a hook invoked after every server-side mutation.
    ///
    /// Tests use this to publish hub events when state changes, the way
    /// the real backend notifies its pub/sub channel.
    pub fn set_change_hook(&self, hook: impl Fn(BoardId, BoardEvent) + Send + Sync + 'static) {
        *self.change_hook.lock() = Some(Arc::new(hook));
    }

    fn fire_hook(&self, board_id: BoardId, event: BoardEvent) {
        let hook = self.change_hook.lock().clone();
        if let Some(hook) = hook {
            hook(board_id, event);
        }
    }

    /// Decrements a failure counter, returning true if this call should
    /// fail.
    fn consume_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl BoardApi for InMemoryBoardApi {
    async fn fetch_board(&self, board_id: BoardId) -> Result<Board, ApiError> {
        if Self::consume_failure(&self.fail_next_fetches) {
            return Err(ApiError::Network("injected fetch failure".to_string()));
        }
        let latency = *self.fetch_latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.boards
            .lock()
            .get(&board_id)
            .cloned()
            .ok_or(ApiError::BoardNotFound(board_id))
    }

    async fn move_task(&self, task_id: TaskId, patch: MovePatch) -> Result<Task, ApiError> {
        if Self::consume_failure(&self.fail_next_moves) {
            return Err(ApiError::Network("injected move failure".to_string()));
        }
        if patch.is_empty() {
            return Err(ApiError::Rejected("empty move patch".to_string()));
        }

        let (board_id, task) = {
            let mut boards = self.boards.lock();
            let Some(board) = boards
                .values_mut()
                .find(|b| b.tasks.iter().any(|t| t.id == task_id))
            else {
                return Err(ApiError::TaskNotFound(task_id));
            };
            let board_id = board.id;

            let current = board
                .tasks
                .iter()
                .find(|t| t.id == task_id)
                .ok_or(ApiError::TaskNotFound(task_id))?;
            let target_status = patch.status.unwrap_or(current.status);

            // The server owns order assignment: a proposed order that
            // collides with another task in the target column is bumped
            // past the column maximum.
            let order = match patch.order {
                Some(proposed) => {
                    let collides = board.tasks.iter().any(|t| {
                        t.id != task_id && t.status == target_status && t.order == proposed
                    });
                    if collides {
                        next_order(&board.tasks, task_id, target_status)
                    } else {
                        proposed
                    }
                }
                None => next_order(&board.tasks, task_id, target_status),
            };

            let task = board
                .tasks
                .iter_mut()
                .find(|t| t.id == task_id)
                .ok_or(ApiError::TaskNotFound(task_id))?;
            task.status = target_status;
            task.order = order;
            (board_id, task.clone())
        };

        self.fire_hook(board_id, BoardEvent::TaskUpdated);
        Ok(task)
    }
}

/// One past the maximum order currently used in a column, ignoring the
/// moving task itself.
fn next_order(tasks: &[Task], moving: TaskId, status: syncboard_proto::board::StatusKind) -> u32 {
    tasks
        .iter()
        .filter(|t| t.id != moving && t.status == status)
        .map(|t| t.order + 1)
        .max()
        .unwrap_or(0)
}
