//! In-process implementation of [`QueueStore`].
//!
//! Rows live in memory and every write is echoed on a broadcast channel, which gives the
//! same "the origin sees its own writes" behaviour as a hosted store. Several hosts sharing one
//! `MemoryQueueStore` behave like several clients of the same remote database, which is what the
//! integration tests rely on. Individual operations can be made to fail to exercise the
//! partial-write paths.

use std::{collections::HashSet, sync::Arc};

use futures::{StreamExt, future::BoxFuture};
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;
use uuid::Uuid;

use super::{ChangeStream, GAMES_TABLE, QUEUE_TABLE, QueueStore, RowChange};
use crate::dao::{
    models::{
        GameRowEntity, GameRowPatch, QueueRowEntity, QueueRowPatch, sort_game_rows,
        sort_queue_rows,
    },
    storage::{StorageError, StorageResult},
};

const CHANGE_CAPACITY: usize = 256;

/// Operations of the storage contract, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListQueue,
    ListGames,
    InsertQueueRow,
    DeleteQueueRow,
    UpdateQueueRow,
    DeleteQueueRows,
    UpsertQueueRows,
    InsertGameRow,
    DeleteGameRow,
    UpdateGameRow,
    Subscribe,
}

/// Failures produced by the memory backend.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    /// A failure was injected for this operation.
    #[error("injected failure for {op:?}")]
    Injected { op: StoreOp },
    /// A row with the same id already exists.
    #[error("duplicate key `{id}` in table `{table}`")]
    DuplicateKey { table: &'static str, id: Uuid },
}

impl From<MemoryStoreError> for StorageError {
    fn from(err: MemoryStoreError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

#[derive(Clone)]
pub struct MemoryQueueStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    tables: RwLock<Tables>,
    queue_tx: broadcast::Sender<RowChange<QueueRowEntity>>,
    games_tx: broadcast::Sender<RowChange<GameRowEntity>>,
}

#[derive(Default)]
struct Tables {
    queue: Vec<QueueRowEntity>,
    games: Vec<GameRowEntity>,
    failing: HashSet<StoreOp>,
    missing: bool,
}

impl Tables {
    fn check(&self, op: StoreOp, table: &'static str) -> StorageResult<()> {
        if self.missing {
            return Err(StorageError::table_missing(table));
        }
        if self.failing.contains(&op) {
            return Err(MemoryStoreError::Injected { op }.into());
        }
        Ok(())
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueueStore {
    /// Create an empty store with both tables provisioned.
    pub fn new() -> Self {
        let (queue_tx, _rx) = broadcast::channel(CHANGE_CAPACITY);
        let (games_tx, _rx) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                tables: RwLock::new(Tables::default()),
                queue_tx,
                games_tx,
            }),
        }
    }

    /// Make every subsequent call to `op` fail until [`Self::clear_failures`] is called.
    pub async fn fail_on(&self, op: StoreOp) {
        self.inner.tables.write().await.failing.insert(op);
    }

    /// Stop injecting failures.
    pub async fn clear_failures(&self) {
        self.inner.tables.write().await.failing.clear();
    }

    /// Simulate an unprovisioned backend: every call reports a missing table.
    pub async fn set_tables_missing(&self, missing: bool) {
        self.inner.tables.write().await.missing = missing;
    }

    /// Copy of the queue rows in queue order.
    pub async fn queue_rows(&self) -> Vec<QueueRowEntity> {
        let mut rows = self.inner.tables.read().await.queue.clone();
        sort_queue_rows(&mut rows);
        rows
    }

    /// Copy of the game rows, most recent first.
    pub async fn game_rows(&self) -> Vec<GameRowEntity> {
        let mut rows = self.inner.tables.read().await.games.clone();
        sort_game_rows(&mut rows);
        rows
    }

    fn emit_queue(&self, change: RowChange<QueueRowEntity>) {
        let _ = self.inner.queue_tx.send(change);
    }

    fn emit_game(&self, change: RowChange<GameRowEntity>) {
        let _ = self.inner.games_tx.send(change);
    }
}

fn into_change_stream<R>(receiver: broadcast::Receiver<RowChange<R>>) -> ChangeStream<R>
where
    R: Clone + Send + 'static,
{
    BroadcastStream::new(receiver)
        .filter_map(|item| async move {
            match item {
                Ok(change) => Some(change),
                Err(err) => {
                    warn!(error = %err, "memory change feed lagged; skipping events");
                    None
                }
            }
        })
        .boxed()
}

impl QueueStore for MemoryQueueStore {
    fn list_queue(&self) -> BoxFuture<'static, StorageResult<Vec<QueueRowEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .inner
                .tables
                .read()
                .await
                .check(StoreOp::ListQueue, QUEUE_TABLE)?;
            Ok(store.queue_rows().await)
        })
    }

    fn list_queue_front(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<QueueRowEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut rows = store.list_queue().await?;
            rows.truncate(limit);
            Ok(rows)
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameRowEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .inner
                .tables
                .read()
                .await
                .check(StoreOp::ListGames, GAMES_TABLE)?;
            Ok(store.game_rows().await)
        })
    }

    fn insert_queue_row(&self, row: QueueRowEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            {
                let mut tables = store.inner.tables.write().await;
                tables.check(StoreOp::InsertQueueRow, QUEUE_TABLE)?;
                if tables.queue.iter().any(|existing| existing.id == row.id) {
                    return Err(MemoryStoreError::DuplicateKey {
                        table: QUEUE_TABLE,
                        id: row.id,
                    }
                    .into());
                }
                tables.queue.push(row.clone());
            }
            store.emit_queue(RowChange::Insert(row));
            Ok(())
        })
    }

    fn delete_queue_row(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let removed = {
                let mut tables = store.inner.tables.write().await;
                tables.check(StoreOp::DeleteQueueRow, QUEUE_TABLE)?;
                let before = tables.queue.len();
                tables.queue.retain(|row| row.id != id);
                before != tables.queue.len()
            };
            if removed {
                store.emit_queue(RowChange::Delete(id));
            }
            Ok(())
        })
    }

    fn update_queue_row(
        &self,
        id: Uuid,
        patch: QueueRowPatch,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let updated = {
                let mut tables = store.inner.tables.write().await;
                tables.check(StoreOp::UpdateQueueRow, QUEUE_TABLE)?;
                tables
                    .queue
                    .iter_mut()
                    .find(|row| row.id == id)
                    .map(|row| {
                        patch.apply_to(row);
                        row.clone()
                    })
            };
            if let Some(row) = updated {
                store.emit_queue(RowChange::Update(row));
            }
            Ok(())
        })
    }

    fn delete_queue_rows(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let removed = {
                let mut tables = store.inner.tables.write().await;
                tables.check(StoreOp::DeleteQueueRows, QUEUE_TABLE)?;
                let removed = tables
                    .queue
                    .iter()
                    .filter(|row| ids.contains(&row.id))
                    .map(|row| row.id)
                    .collect::<Vec<_>>();
                tables.queue.retain(|row| !ids.contains(&row.id));
                removed
            };
            for id in removed {
                store.emit_queue(RowChange::Delete(id));
            }
            Ok(())
        })
    }

    fn upsert_queue_rows(
        &self,
        rows: Vec<QueueRowEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut changes = Vec::with_capacity(rows.len());
            {
                let mut tables = store.inner.tables.write().await;
                tables.check(StoreOp::UpsertQueueRows, QUEUE_TABLE)?;
                for row in rows {
                    match tables.queue.iter_mut().find(|existing| existing.id == row.id) {
                        Some(existing) => {
                            *existing = row.clone();
                            changes.push(RowChange::Update(row));
                        }
                        None => {
                            tables.queue.push(row.clone());
                            changes.push(RowChange::Insert(row));
                        }
                    }
                }
            }
            for change in changes {
                store.emit_queue(change);
            }
            Ok(())
        })
    }

    fn insert_game_row(&self, row: GameRowEntity) -> BoxFuture<'static, StorageResult<Uuid>> {
        let store = self.clone();
        Box::pin(async move {
            let id = row.id;
            {
                let mut tables = store.inner.tables.write().await;
                tables.check(StoreOp::InsertGameRow, GAMES_TABLE)?;
                if tables.games.iter().any(|existing| existing.id == id) {
                    return Err(MemoryStoreError::DuplicateKey {
                        table: GAMES_TABLE,
                        id,
                    }
                    .into());
                }
                tables.games.push(row.clone());
            }
            store.emit_game(RowChange::Insert(row));
            Ok(id)
        })
    }

    fn delete_game_row(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let removed = {
                let mut tables = store.inner.tables.write().await;
                tables.check(StoreOp::DeleteGameRow, GAMES_TABLE)?;
                let before = tables.games.len();
                tables.games.retain(|row| row.id != id);
                before != tables.games.len()
            };
            if removed {
                store.emit_game(RowChange::Delete(id));
            }
            Ok(())
        })
    }

    fn update_game_row(
        &self,
        id: Uuid,
        patch: GameRowPatch,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let updated = {
                let mut tables = store.inner.tables.write().await;
                tables.check(StoreOp::UpdateGameRow, GAMES_TABLE)?;
                tables
                    .games
                    .iter_mut()
                    .find(|row| row.id == id)
                    .map(|row| {
                        patch.apply_to(row);
                        row.clone()
                    })
            };
            if let Some(row) = updated {
                store.emit_game(RowChange::Update(row));
            }
            Ok(())
        })
    }

    fn subscribe_queue_changes(
        &self,
    ) -> BoxFuture<'static, StorageResult<ChangeStream<QueueRowEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .inner
                .tables
                .read()
                .await
                .check(StoreOp::Subscribe, QUEUE_TABLE)?;
            Ok(into_change_stream(store.inner.queue_tx.subscribe()))
        })
    }

    fn subscribe_game_changes(
        &self,
    ) -> BoxFuture<'static, StorageResult<ChangeStream<GameRowEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .inner
                .tables
                .read()
                .await
                .check(StoreOp::Subscribe, GAMES_TABLE)?;
            Ok(into_change_stream(store.inner.games_tx.subscribe()))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if store.inner.tables.read().await.missing {
                return Err(StorageError::table_missing(QUEUE_TABLE));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::GameStatusEntity;

    fn row(name: &str, joined_at: i64) -> QueueRowEntity {
        QueueRowEntity {
            id: Uuid::new_v4(),
            name: name.into(),
            avatar_seed: 7,
            joined_at,
        }
    }

    #[tokio::test]
    async fn list_queue_is_sorted_by_joined_at() {
        let store = MemoryQueueStore::new();
        store.insert_queue_row(row("late", 30)).await.unwrap();
        store.insert_queue_row(row("early", 10)).await.unwrap();
        store.insert_queue_row(row("middle", 20)).await.unwrap();

        let names = store
            .list_queue()
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.name)
            .collect::<Vec<_>>();
        assert_eq!(names, ["early", "middle", "late"]);

        let front = store.list_queue_front(2).await.unwrap();
        assert_eq!(front.len(), 2);
        assert_eq!(front[0].name, "early");
    }

    #[tokio::test]
    async fn writes_are_echoed_on_the_change_feed() {
        let store = MemoryQueueStore::new();
        let mut feed = store.subscribe_queue_changes().await.unwrap();

        let entry = row("ada", 1);
        store.insert_queue_row(entry.clone()).await.unwrap();
        store
            .update_queue_row(entry.id, QueueRowPatch::rename("grace"))
            .await
            .unwrap();
        store.delete_queue_row(entry.id).await.unwrap();
        // absent rows do not produce events
        store.delete_queue_row(entry.id).await.unwrap();

        assert_eq!(feed.next().await, Some(RowChange::Insert(entry.clone())));
        let renamed = QueueRowEntity {
            name: "grace".into(),
            ..entry.clone()
        };
        assert_eq!(feed.next().await, Some(RowChange::Update(renamed)));
        assert_eq!(feed.next().await, Some(RowChange::Delete(entry.id)));
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = MemoryQueueStore::new();
        let entry = row("ada", 1);
        store.insert_queue_row(entry.clone()).await.unwrap();
        let err = store.insert_queue_row(entry).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn injected_failures_and_missing_tables_are_reported() {
        let store = MemoryQueueStore::new();
        store.fail_on(StoreOp::InsertGameRow).await;
        let game = GameRowEntity {
            id: Uuid::new_v4(),
            players: vec![],
            start_time: 1,
            status: GameStatusEntity::Active,
        };
        assert!(store.insert_game_row(game).await.is_err());

        store.clear_failures().await;
        store.set_tables_missing(true).await;
        let err = store.list_queue().await.unwrap_err();
        assert!(err.is_table_missing());
    }
}
