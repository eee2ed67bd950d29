//! Integration tests for hub connection loss and recovery.
//!
//! The hub keeps no event backlog, so everything published while a client
//! is disconnected is gone. The bridge must reconnect with backoff,
//! resubscribe, and force a refetch so the snapshot catches up anyway.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use syncboard::api::memory::InMemoryBoardApi;
use syncboard::bridge::ReconnectConfig;
use syncboard::bridge::ws::WsConnector;
use syncboard::client::{BoardClient, ClientEvent, EngineConfig};
use syncboard::recon::RefetchConfig;
use syncboard_hub::hub::HubState;
use syncboard_proto::board::{
    Board, BoardId, Priority, Role, Status, StatusId, StatusKind, Task, TaskId,
};
use syncboard_proto::event::BoardEvent;
use tokio::sync::mpsc;

fn make_board() -> Board {
    let board_id = BoardId::new();
    Board {
        id: board_id,
        name: "b".to_string(),
        statuses: vec![Status {
            id: StatusId::new(),
            name: "todo".to_string(),
            kind: StatusKind::Todo,
            position: 0,
        }],
        tasks: vec![Task {
            id: TaskId::new(),
            board_id,
            title: "original".to_string(),
            description: None,
            status: StatusKind::Todo,
            priority: Priority::Medium,
            assignee: None,
            order: 0,
            due_date: None,
            tags: Vec::new(),
            created_at: 1000,
        }],
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        refetch: RefetchConfig {
            retries: 2,
            backoff: Duration::from_millis(10),
        },
        reconnect: ReconnectConfig {
            initial: Duration::from_millis(20),
            max: Duration::from_millis(200),
            multiplier: 2.0,
        },
    }
}

async fn wait_for(events: &mut mpsc::Receiver<ClientEvent>, wanted: &ClientEvent) {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for client event")
            .expect("client event stream closed");
        if event == *wanted {
            return;
        }
    }
}

#[tokio::test]
async fn bridge_reconnects_and_resubscribes_after_connection_loss() {
    let board = make_board();
    let api = Arc::new(InMemoryBoardApi::new());
    api.put_board(board.clone());

    let state = Arc::new(HubState::new());
    let (addr, _handle) =
        syncboard_hub::hub::start_server_with_state("127.0.0.1:0", Arc::clone(&state))
            .await
            .expect("failed to start hub");
    let url = format!("ws://{addr}/ws");

    let (_client, mut events) = BoardClient::spawn(
        board.id,
        Role::Member,
        api,
        WsConnector::new(url),
        fast_config(),
    );
    wait_for(&mut events, &ClientEvent::ChannelStatus { connected: true }).await;

    // The hub drops every connection.
    state.close_all_connections().await;
    wait_for(&mut events, &ClientEvent::ChannelStatus { connected: false }).await;

    // The bridge reconnects and resubscribes on its own.
    wait_for(&mut events, &ClientEvent::ChannelStatus { connected: true }).await;
}

#[tokio::test]
async fn changes_missed_while_disconnected_are_recovered_by_forced_refetch() {
    let board = make_board();
    let task_id = board.tasks[0].id;
    let api = Arc::new(InMemoryBoardApi::new());
    api.put_board(board.clone());

    let state = Arc::new(HubState::new());
    let (addr, _handle) =
        syncboard_hub::hub::start_server_with_state("127.0.0.1:0", Arc::clone(&state))
            .await
            .expect("failed to start hub");
    let url = format!("ws://{addr}/ws");

    let (client, mut events) = BoardClient::spawn(
        board.id,
        Role::Member,
        Arc::clone(&api),
        WsConnector::new(url),
        fast_config(),
    );
    wait_for(&mut events, &ClientEvent::ChannelStatus { connected: true }).await;
    wait_for(&mut events, &ClientEvent::SnapshotInstalled).await;

    // Sever the connection, then change state while nobody is listening.
    // The hub has no backlog; this event is simply lost.
    state.close_all_connections().await;
    wait_for(&mut events, &ClientEvent::ChannelStatus { connected: false }).await;
    api.update_task(task_id, BoardEvent::TaskUpdated, |t| {
        t.title = "changed while away".to_string();
    });

    // On reconnect the bridge forces a refetch, which recovers the
    // missed change without ever seeing the event.
    wait_for(&mut events, &ClientEvent::ChannelStatus { connected: true }).await;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if client
            .snapshot()
            .task(task_id)
            .is_some_and(|t| t.title == "changed while away")
        {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "forced refetch never recovered the missed change"
        );
        let _ = tokio::time::timeout(Duration::from_millis(50), events.recv()).await;
    }
}

#[tokio::test]
async fn repeated_connection_losses_keep_recovering() {
    let board = make_board();
    let api = Arc::new(InMemoryBoardApi::new());
    api.put_board(board.clone());

    let state = Arc::new(HubState::new());
    let (addr, _handle) =
        syncboard_hub::hub::start_server_with_state("127.0.0.1:0", Arc::clone(&state))
            .await
            .expect("failed to start hub");
    let url = format!("ws://{addr}/ws");

    let (_client, mut events) = BoardClient::spawn(
        board.id,
        Role::Member,
        api,
        WsConnector::new(url),
        fast_config(),
    );

    for _ in 0..3 {
        wait_for(&mut events, &ClientEvent::ChannelStatus { connected: true }).await;
        state.close_all_connections().await;
        wait_for(&mut events, &ClientEvent::ChannelStatus { connected: false }).await;
    }
    wait_for(&mut events, &ClientEvent::ChannelStatus { connected: true }).await;
}
