#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use futures::{future::BoxFuture, stream::BoxStream};
use uuid::Uuid;

use crate::dao::models::{GameRowEntity, GameRowPatch, QueueRowEntity, QueueRowPatch};
use crate::dao::storage::StorageResult;

/// Name of the table holding waiting players.
pub const QUEUE_TABLE: &str = "queue";
/// Name of the table holding running tables.
pub const GAMES_TABLE: &str = "active_games";

/// A single change notification emitted by the remote store for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowChange<R> {
    /// A row was created.
    Insert(R),
    /// A row was modified; carries the full row after the change.
    Update(R),
    /// The row with this id was removed.
    Delete(Uuid),
}

impl<R> RowChange<R> {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RowChange::Insert(_) => "insert",
            RowChange::Update(_) => "update",
            RowChange::Delete(_) => "delete",
        }
    }
}

/// Live change feed for one table. Dropping the stream tears the subscription down.
pub type ChangeStream<R> = BoxStream<'static, RowChange<R>>;

/// Abstraction over the remote store holding the queue and the running tables.
pub trait QueueStore: Send + Sync {
    /// All queue rows, ascending by `joined_at` (ties broken by id).
    fn list_queue(&self) -> BoxFuture<'static, StorageResult<Vec<QueueRowEntity>>>;
    /// The first `limit` queue rows in queue order.
    fn list_queue_front(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<QueueRowEntity>>>;
    /// All game rows, most recent `start_time` first.
    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameRowEntity>>>;
    fn insert_queue_row(&self, row: QueueRowEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_queue_row(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn update_queue_row(
        &self,
        id: Uuid,
        patch: QueueRowPatch,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_queue_rows(&self, ids: Vec<Uuid>) -> BoxFuture<'static, StorageResult<()>>;
    fn upsert_queue_rows(&self, rows: Vec<QueueRowEntity>)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Persist a new game row and return its identifier.
    fn insert_game_row(&self, row: GameRowEntity) -> BoxFuture<'static, StorageResult<Uuid>>;
    fn delete_game_row(&self, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    fn update_game_row(
        &self,
        id: Uuid,
        patch: GameRowPatch,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn subscribe_queue_changes(
        &self,
    ) -> BoxFuture<'static, StorageResult<ChangeStream<QueueRowEntity>>>;
    fn subscribe_game_changes(
        &self,
    ) -> BoxFuture<'static, StorageResult<ChangeStream<GameRowEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
