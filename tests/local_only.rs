//! Local-only hosts keep their state across restarts through the snapshot store.

use std::{path::PathBuf, sync::Arc};

use rummyq_back::{
    config::AssistantConfig,
    dao::snapshot::{FileSnapshotStore, SnapshotStore},
    services::{mode_service, queue_service, table_service},
    state::{AppState, SharedState, model::Mode},
};

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("rummyq-local-{}", uuid::Uuid::new_v4()))
}

async fn start_host(dir: &PathBuf) -> SharedState {
    let state = AppState::new(
        Mode::LocalOnly,
        Arc::new(FileSnapshotStore::new(dir.clone())),
        AssistantConfig::default(),
    );
    mode_service::bootstrap(&state).await;
    state
}

#[tokio::test]
async fn queue_and_tables_survive_a_restart() {
    let dir = temp_dir();
    let host = start_host(&dir).await;
    for name in ["A", "B", "C", "D", "E", "F"] {
        queue_service::join_queue(&host, name).await.unwrap();
    }
    let game = table_service::create_table(&host).await.unwrap();
    let before = host.local_snapshot().await;
    drop(host);

    let restarted = start_host(&dir).await;
    let after = restarted.local_snapshot().await;

    assert_eq!(after, before);
    assert_eq!(after.queue().len(), 2);
    assert_eq!(after.game(game.id).map(|g| g.players.len()), Some(4));
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn corrupted_snapshots_start_empty() {
    let dir = temp_dir();
    let store = FileSnapshotStore::new(dir.clone());
    store.set("local_queue", "{not json").unwrap();
    store.set("local_games", "[]").unwrap();

    let host = start_host(&dir).await;

    assert!(host.local_snapshot().await.queue().is_empty());
    queue_service::join_queue(&host, "Ada").await.unwrap();
    assert_eq!(start_host(&dir).await.local_snapshot().await.queue().len(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn front_desk_evening_scenario() {
    let dir = temp_dir();
    let host = start_host(&dir).await;
    let mut players = Vec::new();
    for name in ["Ana", "Ben", "Cy", "Dee", "Eve"] {
        players.push(queue_service::join_queue(&host, name).await.unwrap());
    }

    let game = table_service::create_table(&host).await.unwrap();
    let ben = &players[1];
    let swapped = table_service::swap_players(&host, game.id, &[ben.id]).await.unwrap();
    let seated = swapped
        .players
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(seated, ["Ana", "Cy", "Dee", "Eve"]);

    queue_service::join_queue(&host, "Fay").await.unwrap();
    table_service::dissolve_table(&host, game.id).await.unwrap();

    let local = host.local_snapshot().await;
    assert_eq!(local.games().count(), 0);
    assert_eq!(local.queue().len(), 1);
    assert_eq!(local.queue()[0].name, "Fay");
    let _ = std::fs::remove_dir_all(&dir);
}
