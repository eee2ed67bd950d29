//! Drag-and-drop move coordination.
//!
//! Tracks the drag lifecycle and resolves drop targets into move intents
//! for the optimistic patcher. Cross-column drops are strict appends: the
//! dragged task goes to the end of the destination column regardless of
//! where in the column it was released. Dropping within the task's own
//! column is a no-op. Viewers cannot drag at all.

use std::sync::Arc;

use parking_lot::Mutex;
use syncboard_proto::board::{Role, StatusKind, TaskId};

use crate::api::BoardApi;
use crate::patcher::{MoveIntent, MoveOutcome, OptimisticPatcher};
use crate::snapshot::SnapshotStore;

/// Where a drag currently stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragState {
    /// Nothing is being dragged.
    #[default]
    Idle,
    /// A task has been picked up.
    Dragging {
        /// The task under the pointer.
        task: TaskId,
    },
    /// A drop has been submitted and the server has not yet answered.
    Resolving {
        /// The task being resolved.
        task: TaskId,
    },
}

/// What a drop landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// Empty space in a column.
    Column(StatusKind),
    /// Another task's card; the drop resolves to that card's column.
    Card(TaskId),
}

/// Validates drags and turns drops into move intents.
pub struct MoveCoordinator<A> {
    role: Role,
    store: Arc<SnapshotStore>,
    patcher: OptimisticPatcher<A>,
    state: Mutex<DragState>,
}

impl<A: BoardApi> MoveCoordinator<A> {
    /// Creates a coordinator acting with the given role.
    pub fn new(role: Role, store: Arc<SnapshotStore>, patcher: OptimisticPatcher<A>) -> Self {
        Self {
            role,
            store,
            patcher,
            state: Mutex::new(DragState::Idle),
        }
    }

    /// Current drag state.
    #[must_use]
    pub fn drag_state(&self) -> DragState {
        *self.state.lock()
    }

    /// Starts dragging a task.
    ///
    /// Returns false, without changing state, if the role cannot move
    /// tasks, the task is unknown, or a drag is already in progress.
    pub fn begin_drag(&self, task: TaskId) -> bool {
        if !self.role.can_move() {
            tracing::debug!(task = %task, role = ?self.role, "drag denied for role");
            return false;
        }
        if self.store.get().task(task).is_none() {
            tracing::debug!(task = %task, "drag of unknown task ignored");
            return false;
        }
        let mut state = self.state.lock();
        if *state != DragState::Idle {
            return false;
        }
        *state = DragState::Dragging { task };
        true
    }

    /// Abandons an in-progress drag. Safe to call in any state.
    pub fn cancel_drag(&self) {
        let mut state = self.state.lock();
        if let DragState::Dragging { .. } = *state {
            *state = DragState::Idle;
        }
    }

    /// Completes a drag by dropping on a target.
    ///
    /// Resolves the target to a destination column, appends the task to
    /// the end of that column, and submits through the patcher. Dropping
    /// on the task's own column (or on a card in it, including itself)
    /// is a no-op.
    pub async fn drop_on(&self, target: DropTarget) -> MoveOutcome {
        let task = {
            let mut state = self.state.lock();
            let DragState::Dragging { task } = *state else {
                return MoveOutcome::Noop;
            };
            *state = DragState::Resolving { task };
            task
        };

        let outcome = self.resolve_and_apply(task, target).await;
        *self.state.lock() = DragState::Idle;
        outcome
    }

    async fn resolve_and_apply(&self, task: TaskId, target: DropTarget) -> MoveOutcome {
        let snapshot = self.store.get();
        let Some(dragged) = snapshot.task(task) else {
            // Task vanished mid-drag (deleted remotely).
            return MoveOutcome::Noop;
        };

        let target_status = match target {
            DropTarget::Column(kind) => kind,
            DropTarget::Card(card) => match snapshot.task(card) {
                Some(card_task) => card_task.status,
                None => return MoveOutcome::Noop,
            },
        };
        if target_status == dragged.status {
            return MoveOutcome::Noop;
        }

        // Strict append: the end of the destination column.
        let target_order = u32::try_from(snapshot.column_len(target_status)).unwrap_or(u32::MAX);
        self.patcher
            .apply(MoveIntent {
                task_id: task,
                target_status,
                target_order,
            })
            .await
    }
}
