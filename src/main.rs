//! RummyQ back binary entrypoint wiring REST, SSE and the queue store supervisor.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rummyq_back::{
    config::{AppConfig, Backend},
    dao::{
        queue_store::{QueueStore, memory::MemoryQueueStore},
        snapshot::FileSnapshotStore,
        storage::StorageError,
    },
    routes,
    services::{mode_service, storage_supervisor},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let snapshots = Arc::new(FileSnapshotStore::new(config.snapshot_dir.clone()));
    let app_state = AppState::new(config.mode, snapshots, config.assistant.clone());
    mode_service::bootstrap(&app_state).await;

    spawn_supervisor(app_state.clone(), &config);
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the storage supervisor for the configured backend.
fn spawn_supervisor(state: SharedState, config: &AppConfig) {
    let timeout = config.connect_timeout;
    match config.backend {
        #[cfg(feature = "couch-store")]
        Backend::Couch => {
            use rummyq_back::dao::queue_store::couchdb::{CouchConfig, CouchQueueStore};

            tokio::spawn(storage_supervisor::run(
                state,
                || async {
                    let config = CouchConfig::from_env().map_err(StorageError::from)?;
                    let store = CouchQueueStore::connect(config)
                        .await
                        .map_err(StorageError::from)?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn QueueStore>)
                },
                timeout,
            ));
        }
        #[cfg(not(feature = "couch-store"))]
        Backend::Couch => {
            warn!("built without couch-store; falling back to the in-memory queue store");
            spawn_memory_supervisor(state, timeout);
        }
        Backend::Memory => spawn_memory_supervisor(state, timeout),
    }
}

fn spawn_memory_supervisor(state: SharedState, timeout: std::time::Duration) {
    let store = MemoryQueueStore::new();
    info!("using the in-memory queue store");
    tokio::spawn(storage_supervisor::run(
        state,
        move || {
            let store = store.clone();
            async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn QueueStore>) }
        },
        timeout,
    ));
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
