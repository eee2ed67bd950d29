//! Reconciliation scheduler: coalesced forced refetches.
//!
//! Every signal that local state may be stale (a completed move, a hub
//! event, a reconnect) lands here as a refetch trigger. Triggers are
//! coalesced through a capacity-one channel: while a refetch is pending,
//! further triggers are absorbed into it. A single worker task performs
//! the fetches one at a time, so refetches never overlap and the last
//! completed fetch always determines the installed snapshot.

use std::sync::Arc;
use std::time::Duration;

use syncboard_proto::board::BoardId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::BoardApi;
use crate::client::ClientEvent;
use crate::snapshot::SnapshotStore;

/// Retry policy for a single refetch attempt.
#[derive(Debug, Clone, Copy)]
pub struct RefetchConfig {
    /// Retries after the first failed attempt.
    pub retries: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RefetchConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Handle for requesting a board refetch.
///
/// Cheap to clone; all clones feed the same worker.
#[derive(Debug, Clone)]
pub struct ReconcileScheduler {
    trigger: mpsc::Sender<()>,
}

impl ReconcileScheduler {
    /// Spawns the refetch worker and returns a scheduler handle plus the
    /// worker's join handle.
    pub fn spawn<A: BoardApi + 'static>(
        store: Arc<SnapshotStore>,
        api: Arc<A>,
        board_id: BoardId,
        config: RefetchConfig,
        events: mpsc::Sender<ClientEvent>,
    ) -> (Self, JoinHandle<()>) {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let worker = tokio::spawn(refetch_worker(
            store, api, board_id, config, events, trigger_rx,
        ));
        (Self { trigger: trigger_tx }, worker)
    }

    /// Requests a refetch.
    ///
    /// Never blocks. If a refetch request is already queued this trigger
    /// coalesces into it; the worker will observe state at fetch time, so
    /// one fetch covers both signals.
    pub fn schedule_refetch(&self) {
        match self.trigger.try_send(()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(())) => {
                tracing::trace!("refetch already queued, trigger coalesced");
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                tracing::debug!("refetch worker gone, trigger dropped");
            }
        }
    }
}

/// Worker loop: drain triggers, fetch with bounded retries, install.
async fn refetch_worker<A: BoardApi>(
    store: Arc<SnapshotStore>,
    api: Arc<A>,
    board_id: BoardId,
    config: RefetchConfig,
    events: mpsc::Sender<ClientEvent>,
    mut trigger_rx: mpsc::Receiver<()>,
) {
    while trigger_rx.recv().await.is_some() {
        // Absorb any trigger that arrived while we were idle or fetching
        // last time; one fetch covers them all.
        while trigger_rx.try_recv().is_ok() {}

        match fetch_with_retries(api.as_ref(), board_id, config).await {
            Ok(board) => {
                store.install_board(board);
                tracing::debug!(board = %board_id, "snapshot refreshed from server");
                let _ = events.send(ClientEvent::SnapshotInstalled).await;
            }
            Err(error) => {
                tracing::warn!(board = %board_id, %error, "board refetch failed");
                let _ = events
                    .send(ClientEvent::RefetchFailed {
                        error: error.to_string(),
                    })
                    .await;
            }
        }
    }
    tracing::debug!("refetch worker shutting down");
}

async fn fetch_with_retries<A: BoardApi>(
    api: &A,
    board_id: BoardId,
    config: RefetchConfig,
) -> Result<syncboard_proto::board::Board, crate::api::ApiError> {
    let mut attempt = 0;
    loop {
        match api.fetch_board(board_id).await {
            Ok(board) => return Ok(board),
            Err(error) if attempt < config.retries => {
                attempt += 1;
                tracing::debug!(
                    board = %board_id,
                    %error,
                    attempt,
                    "fetch attempt failed, retrying"
                );
                tokio::time::sleep(config.backoff).await;
            }
            Err(error) => return Err(error),
        }
    }
}
