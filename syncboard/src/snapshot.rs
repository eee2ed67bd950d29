//! Snapshot store: the canonical in-memory board state.
//!
//! A [`BoardSnapshot`] is an immutable point-in-time copy of a board's
//! status list and task list, held behind an `Arc`. The [`SnapshotStore`]
//! swaps whole snapshot references atomically, so readers never observe a
//! partially-applied change: every `get()` returns a fully-formed,
//! internally consistent board. A snapshot captured before a mutation is
//! the unit of optimistic rollback; it is superseded the instant a newer
//! snapshot is installed.

use std::sync::Arc;

use parking_lot::RwLock;
use syncboard_proto::board::{Board, MovePatch, Status, StatusKind, Task, TaskId};

/// Immutable point-in-time copy of a board's columns and tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardSnapshot {
    /// Status columns, in display order.
    pub statuses: Vec<Status>,
    /// All tasks on the board.
    pub tasks: Vec<Task>,
}

impl BoardSnapshot {
    /// Builds a snapshot from a board read payload.
    ///
    /// Tasks referencing a status kind with no matching column are
    /// filtered out rather than installed: a structurally inconsistent
    /// payload must not poison the store, and a refetch is always
    /// imminent in this design. Dropped tasks are logged.
    #[must_use]
    pub fn from_board(board: Board) -> Self {
        let Board {
            statuses, tasks, ..
        } = board;
        let tasks = tasks
            .into_iter()
            .filter(|task| {
                let known = statuses.iter().any(|s| s.kind == task.status);
                if !known {
                    tracing::warn!(
                        task = %task.id,
                        status = %task.status,
                        "dropping task referencing a missing status column"
                    );
                }
                known
            })
            .collect();
        Self { statuses, tasks }
    }

    /// Returns the task with the given id, if present.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Returns the tasks in a column, sorted by their `order` value.
    #[must_use]
    pub fn tasks_in(&self, kind: StatusKind) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().filter(|t| t.status == kind).collect();
        tasks.sort_by_key(|t| t.order);
        tasks
    }

    /// Returns the number of tasks currently in a column.
    #[must_use]
    pub fn column_len(&self, kind: StatusKind) -> usize {
        self.tasks.iter().filter(|t| t.status == kind).count()
    }
}

/// Holds the current [`BoardSnapshot`] and swaps it atomically.
///
/// This is the only shared mutable resource in the engine. All mutation
/// goes through [`replace`](Self::replace) and [`patch`](Self::patch);
/// there is no in-place field assignment, so a reader holding the `Arc`
/// from [`get`](Self::get) keeps a stable view for as long as it likes.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<BoardSnapshot>>,
}

impl SnapshotStore {
    /// Creates a store holding an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn get(&self) -> Arc<BoardSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Replaces the current snapshot.
    pub fn replace(&self, snapshot: Arc<BoardSnapshot>) {
        *self.current.write() = snapshot;
    }

    /// Builds a snapshot from a board payload and installs it.
    ///
    /// Returns the installed snapshot.
    pub fn install_board(&self, board: Board) -> Arc<BoardSnapshot> {
        let snapshot = Arc::new(BoardSnapshot::from_board(board));
        self.replace(Arc::clone(&snapshot));
        snapshot
    }

    /// Installs a new snapshot with one task's status/order fields merged.
    ///
    /// This is a shallow merge of the patch into a copy of the task list,
    /// swapped in as a whole; it is not a deep mutation. If the task is
    /// unknown the store is left unchanged. Returns the snapshot that is
    /// current after the call.
    pub fn patch(&self, task_id: TaskId, patch: MovePatch) -> Arc<BoardSnapshot> {
        let mut guard = self.current.write();
        let Some(index) = guard.tasks.iter().position(|t| t.id == task_id) else {
            tracing::debug!(task = %task_id, "patch for unknown task ignored");
            return Arc::clone(&guard);
        };

        let mut next = BoardSnapshot::clone(&guard);
        if let Some(status) = patch.status {
            next.tasks[index].status = status;
        }
        if let Some(order) = patch.order {
            next.tasks[index].order = order;
        }
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        next
    }

    /// Installs a new snapshot with one task replaced by its canonical
    /// server-returned record.
    ///
    /// Used to reconcile optimistic state once the move endpoint responds.
    /// Unknown tasks are ignored (the task may have been deleted remotely
    /// while the move was in flight; the forced refetch will sort it out).
    pub fn merge_canonical(&self, task: Task) {
        let mut guard = self.current.write();
        let Some(index) = guard.tasks.iter().position(|t| t.id == task.id) else {
            tracing::debug!(task = %task.id, "canonical merge for unknown task ignored");
            return;
        };
        let mut next = BoardSnapshot::clone(&guard);
        next.tasks[index] = task;
        *guard = Arc::new(next);
    }
}
