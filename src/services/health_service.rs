use tracing::warn;

use crate::{dto::health::HealthResponse, services::sync_service, state::SharedState};

/// Report the connection state, pinging the queue store when one is installed.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let mode = state.mode().await;
    match state.queue_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                sync_service::note_storage_error(state, "health_check", &err).await;
            }
        }
        None if state.is_degraded().await => warn!("storage unavailable (degraded mode)"),
        None => {}
    }

    if state.is_degraded().await {
        HealthResponse::degraded(mode)
    } else if state.setup_required().await {
        HealthResponse::setup_required(mode)
    } else {
        HealthResponse::ok(mode)
    }
}
