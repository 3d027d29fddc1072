//! Two hosts sharing one queue store converge through the change feeds.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use uuid::Uuid;

use rummyq_back::{
    config::AssistantConfig,
    dao::{
        models::{GameRowEntity, GameRowPatch, QueueRowEntity, QueueRowPatch},
        queue_store::{ChangeStream, QueueStore, memory::MemoryQueueStore},
        snapshot::MemorySnapshotStore,
        storage::StorageResult,
    },
    services::{health_service, mode_service, queue_service, sse_events, sync_service, table_service},
    state::{AppState, SharedState, model::Mode},
};

async fn connected_host(store: &MemoryQueueStore) -> SharedState {
    let state = AppState::new(
        Mode::Connected,
        Arc::new(MemorySnapshotStore::new()),
        AssistantConfig::default(),
    );
    state.install_queue_store(Arc::new(store.clone())).await;
    sync_service::resync(&state).await;
    state
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached in time");
}

async fn queue_names(state: &SharedState) -> Vec<String> {
    state
        .local_snapshot()
        .await
        .queue()
        .iter()
        .map(|player| player.name.clone())
        .collect()
}

#[tokio::test]
async fn joins_on_one_host_appear_on_the_other() {
    let store = MemoryQueueStore::new();
    let front_desk = connected_host(&store).await;
    let lounge = connected_host(&store).await;

    queue_service::join_queue(&front_desk, "Ada").await.unwrap();
    queue_service::join_queue(&lounge, "Bob").await.unwrap();

    eventually(|| async { queue_names(&front_desk).await == ["Ada", "Bob"] }).await;
    eventually(|| async { queue_names(&lounge).await == ["Ada", "Bob"] }).await;
    assert_eq!(store.queue_rows().await.len(), 2);
}

#[tokio::test]
async fn echoes_of_local_writes_do_not_duplicate_entries() {
    let store = MemoryQueueStore::new();
    let host = connected_host(&store).await;

    let ada = queue_service::join_queue(&host, "Ada").await.unwrap();
    queue_service::rename_player(&host, ada.id, "Ada L.").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(queue_names(&host).await, ["Ada L."]);
}

#[tokio::test]
async fn tables_created_elsewhere_leave_the_queue_consistent() {
    let store = MemoryQueueStore::new();
    let front_desk = connected_host(&store).await;
    let lounge = connected_host(&store).await;
    for name in ["A", "B", "C", "D", "E"] {
        queue_service::join_queue(&front_desk, name).await.unwrap();
    }
    eventually(|| async { queue_names(&lounge).await.len() == 5 }).await;

    let game = table_service::create_table(&lounge).await.unwrap();

    eventually(|| async {
        let local = front_desk.local_snapshot().await;
        local.game(game.id).is_some() && local.queue().len() == 1
    })
    .await;
    assert_eq!(queue_names(&front_desk).await, ["E"]);

    table_service::dissolve_table(&front_desk, game.id).await.unwrap();
    eventually(|| async { lounge.local_snapshot().await.games().count() == 0 }).await;
}

#[tokio::test]
async fn a_late_host_starts_from_a_full_fetch() {
    let store = MemoryQueueStore::new();
    let front_desk = connected_host(&store).await;
    for name in ["A", "B", "C"] {
        queue_service::join_queue(&front_desk, name).await.unwrap();
    }
    table_service::create_table(&front_desk).await.unwrap();
    queue_service::join_queue(&front_desk, "D").await.unwrap();

    let late = connected_host(&store).await;

    let snapshot = sse_events::state_snapshot(&late).await;
    assert_eq!(snapshot.queue_count, 1);
    assert_eq!(snapshot.active_games_count, 1);
    assert_eq!(snapshot.games[0].players.len(), 3);
}

#[tokio::test]
async fn local_only_hosts_ignore_the_shared_store() {
    let store = MemoryQueueStore::new();
    let front_desk = connected_host(&store).await;
    let lounge = connected_host(&store).await;

    mode_service::switch_mode(&lounge, Mode::LocalOnly).await;
    queue_service::join_queue(&front_desk, "Remote").await.unwrap();
    queue_service::join_queue(&lounge, "Local").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(queue_names(&lounge).await, ["Local"]);
    assert_eq!(queue_names(&front_desk).await, ["Remote"]);
    assert_eq!(store.queue_rows().await.len(), 1);
}

#[tokio::test]
async fn missing_tables_surface_as_setup_required() {
    let store = MemoryQueueStore::new();
    store.set_tables_missing(true).await;
    let host = connected_host(&store).await;

    let health = health_service::health_status(&host).await;
    assert_eq!(health.status, "setup_required");
    let snapshot = sse_events::state_snapshot(&host).await;
    assert!(snapshot.setup_required);
    assert!(!snapshot.missing_tables.is_empty());

    // mutations still apply locally while the tables are missing
    queue_service::join_queue(&host, "Ada").await.unwrap();
    assert_eq!(queue_names(&host).await, ["Ada"]);

    store.set_tables_missing(false).await;
    sync_service::resync(&host).await;
    assert_eq!(health_service::health_status(&host).await.status, "ok");
}

#[tokio::test]
async fn hosts_without_a_store_report_degraded() {
    let host = AppState::new(
        Mode::Connected,
        Arc::new(MemorySnapshotStore::new()),
        AssistantConfig::default(),
    );

    queue_service::join_queue(&host, "Ada").await.unwrap();

    assert_eq!(health_service::health_status(&host).await.status, "degraded");
    assert!(sse_events::state_snapshot(&host).await.degraded);
    assert_eq!(queue_names(&host).await, ["Ada"]);
}

#[tokio::test]
async fn viewers_receive_a_snapshot_after_each_mutation() {
    let store = MemoryQueueStore::new();
    let host = connected_host(&store).await;
    let mut viewer = host.sse().subscribe();

    queue_service::join_queue(&host, "Ada").await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), viewer.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.event.as_deref(), Some(sse_events::EVENT_STATE));
    let payload: serde_json::Value = serde_json::from_str(&event.data).unwrap();
    assert_eq!(payload["queue"][0]["name"], "Ada");
    assert!(store.health_check().await.is_ok());
}

/// Store whose first queue listing is overtaken by another host's insert.
struct OvertakenListing {
    inner: MemoryQueueStore,
    fired: AtomicBool,
}

impl QueueStore for OvertakenListing {
    fn list_queue(&self) -> BoxFuture<'static, StorageResult<Vec<QueueRowEntity>>> {
        let inner = self.inner.clone();
        let first = !self.fired.swap(true, Ordering::SeqCst);
        Box::pin(async move {
            let rows = inner.list_queue().await?;
            if first {
                inner
                    .insert_queue_row(QueueRowEntity {
                        id: Uuid::new_v4(),
                        name: "Late".into(),
                        avatar_seed: 7,
                        joined_at: 10,
                    })
                    .await?;
            }
            Ok(rows)
        })
    }

    fn list_queue_front(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<QueueRowEntity>>> {
        self.inner.list_queue_front(limit)
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameRowEntity>>> {
        self.inner.list_games()
    }

    fn insert_queue_row(&self, row: QueueRowEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_queue_row(row)
    }

    fn delete_queue_row(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.delete_queue_row(id)
    }

    fn update_queue_row(
        &self,
        id: Uuid,
        patch: QueueRowPatch,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.update_queue_row(id, patch)
    }

    fn delete_queue_rows(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.delete_queue_rows(ids)
    }

    fn upsert_queue_rows(
        &self,
        rows: Vec<QueueRowEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.upsert_queue_rows(rows)
    }

    fn insert_game_row(&self, row: GameRowEntity) -> BoxFuture<'static, StorageResult<Uuid>> {
        self.inner.insert_game_row(row)
    }

    fn delete_game_row(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.delete_game_row(id)
    }

    fn update_game_row(
        &self,
        id: Uuid,
        patch: GameRowPatch,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.update_game_row(id, patch)
    }

    fn subscribe_queue_changes(
        &self,
    ) -> BoxFuture<'static, StorageResult<ChangeStream<QueueRowEntity>>> {
        self.inner.subscribe_queue_changes()
    }

    fn subscribe_game_changes(
        &self,
    ) -> BoxFuture<'static, StorageResult<ChangeStream<GameRowEntity>>> {
        self.inner.subscribe_game_changes()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }
}

#[tokio::test]
async fn changes_landing_during_a_resync_fetch_are_kept() {
    let inner = MemoryQueueStore::new();
    let host = AppState::new(
        Mode::Connected,
        Arc::new(MemorySnapshotStore::new()),
        AssistantConfig::default(),
    );
    host.install_queue_store(Arc::new(OvertakenListing {
        inner: inner.clone(),
        fired: AtomicBool::new(false),
    }))
    .await;

    sync_service::resync(&host).await;

    assert_eq!(inner.queue_rows().await.len(), 1);
    eventually(|| async { queue_names(&host).await == ["Late"] }).await;
    // later changes still flow once the resync is over
    queue_service::join_queue(&host, "Ada").await.unwrap();
    assert_eq!(queue_names(&host).await, ["Late", "Ada"]);
}
