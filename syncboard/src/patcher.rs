//! Optimistic move application with rollback.
//!
//! A move is applied to the local snapshot immediately, then submitted to
//! the server. On success the server's canonical task record is merged
//! and a forced refetch is scheduled; on failure the snapshot captured
//! before the speculative patch is restored wholesale, with no user-facing
//! error surface. The UI simply sees the card snap back.

use std::sync::Arc;

use syncboard_proto::board::{MovePatch, StatusKind, TaskId};
use tokio::sync::mpsc;

use crate::api::BoardApi;
use crate::client::ClientEvent;
use crate::recon::ReconcileScheduler;
use crate::snapshot::SnapshotStore;

/// A resolved move request: the task, its destination column, and the
/// order the client proposes there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveIntent {
    /// Task being moved.
    pub task_id: TaskId,
    /// Destination column.
    pub target_status: StatusKind,
    /// Proposed position in the destination column.
    pub target_order: u32,
}

/// What became of a move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The server accepted the move; canonical state has been merged.
    Applied,
    /// The server rejected the move or was unreachable; the snapshot was
    /// restored to its pre-move state.
    RolledBack,
    /// The request changed nothing and was not submitted.
    Noop,
}

/// Applies moves optimistically and reconciles them with the server.
pub struct OptimisticPatcher<A> {
    store: Arc<SnapshotStore>,
    api: Arc<A>,
    scheduler: ReconcileScheduler,
    events: mpsc::Sender<ClientEvent>,
}

impl<A: BoardApi> OptimisticPatcher<A> {
    /// Creates a patcher over the given store and API.
    pub fn new(
        store: Arc<SnapshotStore>,
        api: Arc<A>,
        scheduler: ReconcileScheduler,
        events: mpsc::Sender<ClientEvent>,
    ) -> Self {
        Self {
            store,
            api,
            scheduler,
            events,
        }
    }

    /// Applies a move intent: speculative local patch, server submission,
    /// then canonical merge or rollback.
    ///
    /// Unknown tasks and moves into the task's current column are no-ops
    /// that leave the store untouched.
    pub async fn apply(&self, intent: MoveIntent) -> MoveOutcome {
        let previous = self.store.get();
        let Some(task) = previous.task(intent.task_id) else {
            tracing::debug!(task = %intent.task_id, "move for unknown task ignored");
            return MoveOutcome::Noop;
        };
        if task.status == intent.target_status {
            tracing::debug!(task = %intent.task_id, "same-column move ignored");
            return MoveOutcome::Noop;
        }

        let patch = MovePatch {
            status: Some(intent.target_status),
            order: Some(intent.target_order),
        };
        self.store.patch(intent.task_id, patch);

        match self.api.move_task(intent.task_id, patch).await {
            Ok(canonical) => {
                self.store.merge_canonical(canonical);
                self.scheduler.schedule_refetch();
                let _ = self
                    .events
                    .send(ClientEvent::MoveApplied {
                        task: intent.task_id,
                    })
                    .await;
                MoveOutcome::Applied
            }
            Err(error) => {
                tracing::warn!(task = %intent.task_id, %error, "move rejected, rolling back");
                self.store.replace(previous);
                let _ = self
                    .events
                    .send(ClientEvent::MoveRolledBack {
                        task: intent.task_id,
                    })
                    .await;
                MoveOutcome::RolledBack
            }
        }
    }
}
