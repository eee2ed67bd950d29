//! Board client: wires the engine's pieces together.
//!
//! A [`BoardClient`] owns the snapshot store, the move coordinator, the
//! reconciliation scheduler, and the realtime bridge for a single board,
//! and surfaces engine activity to the embedding application as a stream
//! of [`ClientEvent`]s.

use std::sync::Arc;

use syncboard_proto::board::{BoardId, Role, TaskId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::BoardApi;
use crate::bridge::{BridgeHandle, ChannelConnector, ReconnectConfig, spawn_bridge};
use crate::moves::{DragState, DropTarget, MoveCoordinator};
use crate::patcher::{MoveOutcome, OptimisticPatcher};
use crate::recon::{ReconcileScheduler, RefetchConfig};
use crate::snapshot::{BoardSnapshot, SnapshotStore};

/// Engine activity reported to the embedding application.
///
/// These are notifications, not state: the state is always the snapshot.
/// A UI typically re-renders its visible columns on every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A fresh snapshot was fetched from the server and installed.
    SnapshotInstalled,
    /// A move was accepted by the server.
    MoveApplied {
        /// The task that moved.
        task: TaskId,
    },
    /// A move was rejected and the snapshot rolled back.
    MoveRolledBack {
        /// The task whose move failed.
        task: TaskId,
    },
    /// A board refetch exhausted its retries.
    RefetchFailed {
        /// Description of the last error.
        error: String,
    },
    /// The realtime channel connected or dropped.
    ChannelStatus {
        /// True when subscribed to the board's channel.
        connected: bool,
    },
}

/// Tuning knobs for a [`BoardClient`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// Retry policy for board refetches.
    pub refetch: RefetchConfig,
    /// Backoff policy for hub reconnects.
    pub reconnect: ReconnectConfig,
}

/// Synchronization engine for one board.
///
/// Dropping the client stops the bridge and the refetch worker.
pub struct BoardClient<A> {
    board_id: BoardId,
    store: Arc<SnapshotStore>,
    coordinator: MoveCoordinator<A>,
    scheduler: ReconcileScheduler,
    refetch_worker: JoinHandle<()>,
    _bridge: BridgeHandle,
}

impl<A> Drop for BoardClient<A> {
    fn drop(&mut self) {
        self.refetch_worker.abort();
    }
}

impl<A: BoardApi + 'static> BoardClient<A> {
    /// Spawns the engine for a board.
    ///
    /// Starts the refetch worker and the realtime bridge, and schedules
    /// the initial board fetch. Returns the client and the receiver for
    /// its event stream.
    pub fn spawn<C: ChannelConnector>(
        board_id: BoardId,
        role: Role,
        api: Arc<A>,
        connector: C,
        config: EngineConfig,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let store = Arc::new(SnapshotStore::new());
        let (events_tx, events_rx) = mpsc::channel(64);

        let (scheduler, refetch_worker) = ReconcileScheduler::spawn(
            Arc::clone(&store),
            Arc::clone(&api),
            board_id,
            config.refetch,
            events_tx.clone(),
        );
        let bridge = spawn_bridge(
            connector,
            board_id,
            scheduler.clone(),
            events_tx.clone(),
            config.reconnect,
        );
        let patcher = OptimisticPatcher::new(
            Arc::clone(&store),
            api,
            scheduler.clone(),
            events_tx,
        );
        let coordinator = MoveCoordinator::new(role, Arc::clone(&store), patcher);

        // Populate the snapshot without waiting for the bridge.
        scheduler.schedule_refetch();

        let client = Self {
            board_id,
            store,
            coordinator,
            scheduler,
            refetch_worker,
            _bridge: bridge,
        };
        (client, events_rx)
    }

    /// The board this client synchronizes.
    #[must_use]
    pub fn board_id(&self) -> BoardId {
        self.board_id
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<BoardSnapshot> {
        self.store.get()
    }

    /// Current drag state.
    #[must_use]
    pub fn drag_state(&self) -> DragState {
        self.coordinator.drag_state()
    }

    /// Starts dragging a task. See [`MoveCoordinator::begin_drag`].
    pub fn begin_drag(&self, task: TaskId) -> bool {
        self.coordinator.begin_drag(task)
    }

    /// Abandons an in-progress drag.
    pub fn cancel_drag(&self) {
        self.coordinator.cancel_drag();
    }

    /// Completes a drag. See [`MoveCoordinator::drop_on`].
    pub async fn drop_on(&self, target: DropTarget) -> MoveOutcome {
        self.coordinator.drop_on(target).await
    }

    /// Requests a board refetch.
    pub fn refresh(&self) {
        self.scheduler.schedule_refetch();
    }
}
