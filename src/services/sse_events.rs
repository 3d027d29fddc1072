use tracing::warn;

use crate::{
    dto::{sse::ServerEvent, state::StateSnapshot},
    state::SharedState,
};

pub const EVENT_STATE: &str = "state";

/// Build the full snapshot pushed to viewers.
pub async fn state_snapshot(state: &SharedState) -> StateSnapshot {
    let mode = state.mode().await;
    let flags = state.sync_flags().await;
    let local = state.local().read().await;
    StateSnapshot::build(mode, flags, &local)
}

/// Push the current snapshot to every viewer.
pub async fn broadcast_state(state: &SharedState) {
    if state.sse().viewer_count() == 0 {
        return;
    }
    let snapshot = state_snapshot(state).await;
    if let Some(event) = state_event(&snapshot) {
        state.sse().broadcast(event);
    }
}

/// Serialize the snapshot as a `state` event without broadcasting it.
pub fn state_event(snapshot: &StateSnapshot) -> Option<ServerEvent> {
    match ServerEvent::json(Some(EVENT_STATE.to_string()), snapshot) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialize state SSE payload");
            None
        }
    }
}
