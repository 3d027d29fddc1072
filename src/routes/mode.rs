use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::mode::{ModeView, SwitchModeRequest},
    services::mode_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/mode",
    tag = "mode",
    responses((status = 200, description = "Current mode", body = ModeView))
)]
pub async fn get_mode(State(state): State<SharedState>) -> Json<ModeView> {
    Json(mode_service::current_mode(&state).await)
}

#[utoipa::path(
    put,
    path = "/mode",
    tag = "mode",
    request_body = SwitchModeRequest,
    responses((status = 200, description = "Mode after the switch", body = ModeView))
)]
/// Switch between connected and local-only operation.
pub async fn switch_mode(
    State(state): State<SharedState>,
    Json(payload): Json<SwitchModeRequest>,
) -> Json<ModeView> {
    Json(mode_service::switch_mode(&state, payload.mode).await)
}

pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/mode", get(get_mode).put(switch_mode))
}
