use tracing::info;

use crate::{
    dto::mode::ModeView,
    services::{snapshot_service, sse_events, sync_service},
    state::{SharedState, local::LocalState, model::Mode},
};

/// Current mode plus the degraded flag.
pub async fn current_mode(state: &SharedState) -> ModeView {
    ModeView {
        mode: state.mode().await,
        degraded: state.is_degraded().await,
    }
}

/// Prepare the local state for the configured startup mode.
///
/// Local-only mode restores the snapshot; connected mode waits for the storage supervisor.
pub async fn bootstrap(state: &SharedState) {
    if state.mode().await == Mode::LocalOnly {
        let restored = snapshot_service::restore(state.snapshots());
        info!(
            queue = restored.queue().len(),
            games = restored.games().count(),
            "starting in local-only mode"
        );
        *state.local().write().await = restored;
    } else {
        info!("starting in connected mode");
    }
}

/// Switch between connected and local-only operation. Switching to the current mode is a no-op.
///
/// Entering local-only cancels the remote subscriptions and loads the local snapshot; leaving it
/// discards the local state and rebuilds it from the remote store.
pub async fn switch_mode(state: &SharedState, target: Mode) -> ModeView {
    let gate = state.mode_gate().lock().await;
    let current = state.mode().await;
    if current == target {
        drop(gate);
        return current_mode(state).await;
    }

    match target {
        Mode::LocalOnly => {
            sync_service::unsubscribe(state).await;
            let restored = snapshot_service::restore(state.snapshots());
            // mode and contents change together under the local lock
            let mut local = state.local().write().await;
            state.set_mode(Mode::LocalOnly).await;
            *local = restored;
            drop(local);
            info!("switched to local-only mode");
        }
        Mode::Connected => {
            let mut local = state.local().write().await;
            state.set_mode(Mode::Connected).await;
            *local = LocalState::new();
            drop(local);
            info!("switched to connected mode");
            sync_service::resync(state).await;
        }
    }

    sse_events::broadcast_state(state).await;
    drop(gate);
    current_mode(state).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AssistantConfig,
        dao::{queue_store::memory::MemoryQueueStore, snapshot::MemorySnapshotStore},
        services::queue_service::join_queue,
        state::AppState,
    };

    #[tokio::test]
    async fn switching_modes_swaps_the_visible_state() {
        let store = MemoryQueueStore::new();
        let state = AppState::new(
            Mode::Connected,
            Arc::new(MemorySnapshotStore::new()),
            AssistantConfig::default(),
        );
        state.install_queue_store(Arc::new(store.clone())).await;
        join_queue(&state, "Remote").await.unwrap();

        let view = switch_mode(&state, Mode::LocalOnly).await;
        assert_eq!(view.mode, Mode::LocalOnly);
        assert!(state.local_snapshot().await.queue().is_empty());
        join_queue(&state, "Local").await.unwrap();
        assert_eq!(store.queue_rows().await.len(), 1);

        switch_mode(&state, Mode::Connected).await;
        let local = state.local_snapshot().await;
        assert_eq!(local.queue().len(), 1);
        assert_eq!(local.queue()[0].name, "Remote");

        switch_mode(&state, Mode::LocalOnly).await;
        assert_eq!(state.local_snapshot().await.queue()[0].name, "Local");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn joins_racing_a_switch_keep_the_local_snapshot_intact() {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let store = MemoryQueueStore::new();
        let state = AppState::new(Mode::LocalOnly, snapshots.clone(), AssistantConfig::default());
        state.install_queue_store(Arc::new(store.clone())).await;
        join_queue(&state, "Keep").await.unwrap();

        let joins = (0..32)
            .map(|i| {
                let state = state.clone();
                tokio::spawn(async move { join_queue(&state, &format!("P{i}")).await.unwrap() })
            })
            .collect::<Vec<_>>();
        switch_mode(&state, Mode::Connected).await;
        for join in joins {
            join.await.unwrap();
        }

        let persisted = snapshot_service::restore(snapshots.as_ref());
        assert!(persisted.queue().iter().any(|p| p.name == "Keep"));
        // every player landed on exactly one side of the switch
        for row in store.queue_rows().await {
            assert!(persisted.player(row.id).is_none(), "{} is on both sides", row.name);
        }
        assert_eq!(persisted.queue().len() + store.queue_rows().await.len(), 33);
    }

    #[tokio::test]
    async fn switching_to_the_current_mode_is_a_no_op() {
        let state = AppState::new(
            Mode::LocalOnly,
            Arc::new(MemorySnapshotStore::new()),
            AssistantConfig::default(),
        );
        join_queue(&state, "Ada").await.unwrap();

        let view = switch_mode(&state, Mode::LocalOnly).await;

        assert_eq!(view.mode, Mode::LocalOnly);
        assert_eq!(state.local_snapshot().await.queue().len(), 1);
    }
}
