use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::{
    dao::{queue_store::QueueStore, storage::StorageError},
    services::{sse_events, sync_service},
    state::{SharedState, model::Mode},
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Connect to the queue store and keep the shared state degraded while it is unreachable.
///
/// Every connection attempt is bounded by `connect_timeout`; the host keeps serving in the
/// meantime. Once connected the change feeds are subscribed and the local state re-fetched.
/// A failing health check drops the store and starts over with exponential backoff.
pub async fn run<F, Fut>(state: SharedState, mut connect: F, connect_timeout: Duration)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn QueueStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match timeout(connect_timeout, connect()).await {
            Ok(Ok(store)) => store,
            Ok(Err(err)) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
            Err(_) => {
                warn!(
                    timeout_ms = connect_timeout.as_millis() as u64,
                    "storage connection check timed out; continuing disconnected"
                );
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        state.install_queue_store(store.clone()).await;
        info!("storage connection established; leaving degraded mode");
        delay = INITIAL_DELAY;
        resync_gated(&state).await;
        sse_events::broadcast_state(&state).await;

        loop {
            sleep(HEALTH_POLL_INTERVAL).await;
            match store.health_check().await {
                Ok(()) => {
                    if needs_resync(&state).await {
                        info!("storage healthy; re-establishing subscriptions");
                        resync_gated(&state).await;
                    }
                }
                Err(err) if err.is_table_missing() => {
                    sync_service::note_storage_error(&state, "health_check", &err).await;
                }
                Err(err) => {
                    warn!(error = %err, "storage health check failed; entering degraded mode");
                    sync_service::unsubscribe(&state).await;
                    state.clear_queue_store().await;
                    sse_events::broadcast_state(&state).await;
                    break;
                }
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

async fn resync_gated(state: &SharedState) {
    let _gate = state.mode_gate().lock().await;
    sync_service::resync(state).await;
}

async fn needs_resync(state: &SharedState) -> bool {
    state.mode().await == Mode::Connected
        && (state.setup_required().await || !sync_service::is_subscribed(state).await)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        config::AssistantConfig,
        dao::{
            models::QueueRowEntity,
            queue_store::memory::MemoryQueueStore,
            snapshot::MemorySnapshotStore,
        },
        state::AppState,
    };

    #[tokio::test]
    async fn hung_connection_keeps_the_host_degraded_until_a_retry_succeeds() {
        let state = AppState::new(
            Mode::Connected,
            Arc::new(MemorySnapshotStore::new()),
            AssistantConfig::default(),
        );
        let store = MemoryQueueStore::new();
        store
            .insert_queue_row(QueueRowEntity {
                id: uuid::Uuid::new_v4(),
                name: "Ada".into(),
                avatar_seed: 1,
                joined_at: 1,
            })
            .await
            .unwrap();

        let attempts = Arc::new(AtomicUsize::new(0));
        let connect = {
            let attempts = attempts.clone();
            let store = store.clone();
            move || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                let store = store.clone();
                async move {
                    if attempt == 0 {
                        futures::future::pending::<()>().await;
                    }
                    Ok(Arc::new(store) as Arc<dyn QueueStore>)
                }
            }
        };

        let supervisor = tokio::spawn(run(state.clone(), connect, Duration::from_millis(50)));

        sleep(Duration::from_millis(200)).await;
        assert!(state.is_degraded().await);

        let mut watcher = state.degraded_watcher();
        tokio::time::timeout(Duration::from_secs(5), watcher.wait_for(|degraded| !degraded))
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while state.local_snapshot().await.queue().is_empty() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        supervisor.abort();
    }
}
