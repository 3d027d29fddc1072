use axum::{Json, Router, extract::State, routing::get};

use crate::{dto::state::StateSnapshot, services::sse_events, state::SharedState};

#[utoipa::path(
    get,
    path = "/state",
    tag = "state",
    responses((status = 200, description = "Queue, tables and connection flags", body = StateSnapshot))
)]
/// Return the full snapshot shown to viewers.
pub async fn get_state(State(state): State<SharedState>) -> Json<StateSnapshot> {
    Json(sse_events::state_snapshot(&state).await)
}

pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/state", get(get_state))
}
