//! Local-only persistence of the queue and tables.

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
    dao::{
        models::{GameRowEntity, QueueRowEntity},
        snapshot::SnapshotStore,
    },
    state::{
        local::LocalState,
        model::{Game, Player},
    },
};

/// Snapshot key holding the serialized queue.
pub const QUEUE_KEY: &str = "local_queue";
/// Snapshot key holding the serialized tables.
pub const GAMES_KEY: &str = "local_games";

/// Write both collections to the snapshot store. Failures are logged.
pub fn persist(store: &dyn SnapshotStore, local: &LocalState) {
    let queue = local
        .queue()
        .iter()
        .cloned()
        .map(QueueRowEntity::from)
        .collect::<Vec<_>>();
    let games = local
        .games()
        .cloned()
        .map(GameRowEntity::from)
        .collect::<Vec<_>>();

    write_key(store, QUEUE_KEY, &queue);
    write_key(store, GAMES_KEY, &games);
}

/// Rebuild the local state from the snapshot store.
///
/// A missing key restores an empty collection; an unreadable or malformed one is logged and
/// treated as empty.
pub fn restore(store: &dyn SnapshotStore) -> LocalState {
    let queue = read_key::<Vec<QueueRowEntity>>(store, QUEUE_KEY).unwrap_or_default();
    let games = read_key::<Vec<GameRowEntity>>(store, GAMES_KEY).unwrap_or_default();

    let mut local = LocalState::new();
    local.replace_queue(queue.into_iter().map(Player::from).collect());
    local.replace_games(games.into_iter().map(Game::from).collect());
    debug!(
        queue = local.queue().len(),
        games = local.games().count(),
        "restored local snapshot"
    );
    local
}

fn write_key<T: Serialize>(store: &dyn SnapshotStore, key: &str, value: &T) {
    let blob = match serde_json::to_string(value) {
        Ok(blob) => blob,
        Err(err) => {
            warn!(key, error = %err, "failed to serialize local snapshot");
            return;
        }
    };

    if let Err(err) = store.set(key, &blob) {
        warn!(key, error = %err, "failed to persist local snapshot");
    }
}

fn read_key<T: DeserializeOwned>(store: &dyn SnapshotStore, key: &str) -> Option<T> {
    let blob = match store.get(key) {
        Ok(Some(blob)) => blob,
        Ok(None) => return None,
        Err(err) => {
            warn!(key, error = %err, "failed to read local snapshot; starting empty");
            return None;
        }
    };

    match serde_json::from_str(&blob) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, error = %err, "malformed local snapshot; starting empty");
            None
        }
    }
}
