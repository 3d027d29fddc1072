//! Keeps the local state in step with the remote store.
//!
//! Local mutations go through [`mutate_local`], which persists (local-only mode) and pushes the
//! result to viewers. Remote calls go through [`remote_call`], which never fails the caller:
//! storage errors are logged and a missing table latches the setup-required flag. Remote change
//! feeds are forwarded into the reconciler by tasks owned by a [`Subscription`].

use std::sync::{Arc, Weak};

use futures::{StreamExt, future::BoxFuture};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    dao::{
        models::{GameRowEntity, QueueRowEntity},
        queue_store::{ChangeStream, QueueStore, RowChange},
        storage::{StorageError, StorageResult},
    },
    services::{snapshot_service, sse_events, table_service},
    state::{
        AppState, SharedState, Subscription,
        local::LocalState,
        model::{Game, Mode, Player},
        reconciler::{self, Reconciled, RemoteChange},
    },
};

/// Outcome of a remote call issued on behalf of a mutation.
#[derive(Debug)]
pub enum RemoteCall<T> {
    /// Local-only mode, or connected mode without a store.
    Skipped,
    /// The store accepted the call.
    Done(T),
    /// The store rejected the call; the failure has been logged.
    Failed,
}

impl<T> RemoteCall<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, RemoteCall::Done(_))
    }
}

/// Apply `mutation` to the local state, then persist (local-only) and notify viewers.
///
/// Returns the mutation output and the mode it was applied under; follow-up remote calls must
/// use that mode. The mode is read under the local write lock, which mode switches also hold.
pub async fn mutate_local<T>(
    state: &SharedState,
    mutation: impl FnOnce(&mut LocalState) -> T,
) -> (T, Mode) {
    let (output, mode) = {
        let mut local = state.local().write().await;
        let mode = state.mode().await;
        let output = mutation(&mut local);
        if mode == Mode::LocalOnly {
            snapshot_service::persist(state.snapshots(), &local);
        }
        (output, mode)
    };
    sse_events::broadcast_state(state).await;
    (output, mode)
}

/// The store remote calls should target, if `mode` issues any.
pub async fn remote_target(
    state: &SharedState,
    mode: Mode,
    operation: &'static str,
) -> Option<Arc<dyn QueueStore>> {
    if mode == Mode::LocalOnly {
        return None;
    }
    let store = state.queue_store().await;
    if store.is_none() {
        warn!(operation, "storage unavailable (degraded mode); remote call skipped");
    }
    store
}

/// Issue one remote call for `operation` on behalf of a mutation applied under `mode`, logging
/// instead of propagating failures.
pub async fn remote_call<T, F>(
    state: &SharedState,
    mode: Mode,
    operation: &'static str,
    call: F,
) -> RemoteCall<T>
where
    F: FnOnce(Arc<dyn QueueStore>) -> BoxFuture<'static, StorageResult<T>>,
{
    let Some(store) = remote_target(state, mode, operation).await else {
        return RemoteCall::Skipped;
    };

    match call(store).await {
        Ok(value) => RemoteCall::Done(value),
        Err(err) => {
            note_storage_error(state, operation, &err).await;
            RemoteCall::Failed
        }
    }
}

/// Log a storage failure; a missing table puts the host into the setup-required state.
pub async fn note_storage_error(state: &SharedState, operation: &'static str, err: &StorageError) {
    match err {
        StorageError::TableMissing { table } => {
            if state.mark_table_missing(table).await {
                error!(table = %table, operation, "remote table is missing; setup required");
                sse_events::broadcast_state(state).await;
            } else {
                debug!(table = %table, operation, "remote table still missing");
            }
        }
        StorageError::Unavailable { .. } => {
            warn!(operation, error = %err, "storage call failed; local state kept");
        }
    }
}

/// Fold one remote change into the local state. Ignored outside connected mode.
///
/// While a resync is fetching, changes are held back and replayed on top of the fetched state.
pub async fn apply_remote(state: &SharedState, change: RemoteChange) {
    {
        let mut pending = state.pending_changes().lock().await;
        if let Some(buffer) = pending.as_mut() {
            buffer.push(change);
            return;
        }
    }

    let table = change.table();
    let kind = change.kind();
    let outcome = {
        let mut local = state.local().write().await;
        if state.mode().await != Mode::Connected {
            return;
        }
        reconciler::apply_change(&mut local, change)
    };

    match outcome {
        Reconciled::Applied => {
            debug!(table, kind, "applied remote change");
            sse_events::broadcast_state(state).await;
        }
        Reconciled::Ignored => debug!(table, kind, "remote change already reflected locally"),
    }
}

/// Whether change feeds are currently being forwarded.
pub async fn is_subscribed(state: &SharedState) -> bool {
    state
        .subscription()
        .lock()
        .await
        .as_ref()
        .is_some_and(|subscription| !subscription.is_empty())
}

/// Cancel the live change feeds, if any.
pub async fn unsubscribe(state: &SharedState) {
    let subscription = state.subscription().lock().await.take();
    if let Some(subscription) = subscription {
        subscription.cancel();
        info!("remote change subscriptions cancelled");
    }
}

/// Re-subscribe to both change feeds and replace the local state with a full fetch, then run
/// the overlap repair sweep.
///
/// Callers hold the mode gate. Does nothing outside connected mode or without a store.
pub async fn resync(state: &SharedState) {
    if state.mode().await != Mode::Connected {
        return;
    }
    let Some(store) = state.queue_store().await else {
        warn!("storage unavailable (degraded mode); resync postponed");
        return;
    };

    unsubscribe(state).await;
    *state.pending_changes().lock().await = Some(Vec::new());
    match open_subscription(state, &store).await {
        Ok(subscription) => {
            *state.subscription().lock().await = Some(subscription);
            debug!("subscribed to remote change feeds");
        }
        Err(err) => {
            state.pending_changes().lock().await.take();
            note_storage_error(state, "subscribe", &err).await;
            return;
        }
    }

    match futures::try_join!(store.list_queue(), store.list_games()) {
        Ok((queue, games)) => {
            let (queue_len, games_len) = (queue.len(), games.len());
            let replayed = {
                let mut local = state.local().write().await;
                local.replace_queue(queue.into_iter().map(Player::from).collect());
                local.replace_games(games.into_iter().map(Game::from).collect());
                // taken under the local lock so later changes apply after the replay
                let buffered = state
                    .pending_changes()
                    .lock()
                    .await
                    .take()
                    .unwrap_or_default();
                let replayed = buffered.len();
                for change in buffered {
                    reconciler::apply_change(&mut local, change);
                }
                replayed
            };
            if state.clear_missing_tables().await {
                info!("remote tables are available; setup complete");
            }
            info!(
                queue = queue_len,
                games = games_len,
                replayed,
                "local state refreshed from remote store"
            );
            sse_events::broadcast_state(state).await;
            table_service::repair_overlaps(state).await;
        }
        Err(err) => {
            unsubscribe(state).await;
            state.pending_changes().lock().await.take();
            note_storage_error(state, "refetch", &err).await;
        }
    }
}

async fn open_subscription(
    state: &SharedState,
    store: &Arc<dyn QueueStore>,
) -> StorageResult<Subscription> {
    let queue_changes = store.subscribe_queue_changes().await?;
    let game_changes = store.subscribe_game_changes().await?;

    let weak = Arc::downgrade(state);
    Ok(Subscription::new(vec![
        spawn_forwarder::<QueueRowEntity>(weak.clone(), queue_changes, RemoteChange::Queue),
        spawn_forwarder::<GameRowEntity>(weak, game_changes, RemoteChange::Game),
    ]))
}

fn spawn_forwarder<R>(
    state: Weak<AppState>,
    mut changes: ChangeStream<R>,
    wrap: fn(RowChange<R>) -> RemoteChange,
) -> JoinHandle<()>
where
    R: Send + 'static,
{
    tokio::spawn(async move {
        while let Some(change) = changes.next().await {
            let Some(state) = state.upgrade() else {
                break;
            };
            apply_remote(&state, wrap(change)).await;
        }
        debug!("remote change feed ended");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AssistantConfig,
        dao::{
            queue_store::memory::{MemoryQueueStore, StoreOp},
            snapshot::MemorySnapshotStore,
        },
    };

    fn connected() -> SharedState {
        AppState::new(
            Mode::Connected,
            Arc::new(MemorySnapshotStore::new()),
            AssistantConfig::default(),
        )
    }

    #[tokio::test]
    async fn remote_calls_are_skipped_without_a_store() {
        let state = connected();
        let call = remote_call(&state, Mode::Connected, "test", |store| store.health_check()).await;
        assert!(matches!(call, RemoteCall::Skipped));
    }

    #[tokio::test]
    async fn failed_calls_are_reported_not_raised() {
        let state = connected();
        let store = MemoryQueueStore::new();
        store.fail_on(StoreOp::DeleteQueueRow).await;
        state.install_queue_store(Arc::new(store)).await;

        let call = remote_call(&state, Mode::Connected, "leave_queue", |store| {
            store.delete_queue_row(uuid::Uuid::new_v4())
        })
        .await;

        assert!(matches!(call, RemoteCall::Failed));
        assert!(!state.setup_required().await);
    }

    #[tokio::test]
    async fn missing_tables_latch_setup_required() {
        let state = connected();
        let store = MemoryQueueStore::new();
        store.set_tables_missing(true).await;
        state.install_queue_store(Arc::new(store.clone())).await;

        resync(&state).await;
        assert!(state.setup_required().await);
        assert!(!is_subscribed(&state).await);

        store.set_tables_missing(false).await;
        resync(&state).await;
        assert!(!state.setup_required().await);
        assert!(is_subscribed(&state).await);
    }

    #[tokio::test]
    async fn remote_changes_are_ignored_in_local_only_mode() {
        let state = AppState::new(
            Mode::LocalOnly,
            Arc::new(MemorySnapshotStore::new()),
            AssistantConfig::default(),
        );
        let row = QueueRowEntity {
            id: uuid::Uuid::new_v4(),
            name: "Ada".into(),
            avatar_seed: 1,
            joined_at: 1,
        };

        apply_remote(&state, RemoteChange::Queue(RowChange::Insert(row))).await;

        assert!(state.local_snapshot().await.queue().is_empty());
    }
}
