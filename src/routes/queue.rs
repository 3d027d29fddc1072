use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{post, put},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        queue::{
            JoinQueueRequest, JoinQueueResponse, MovePlayerRequest, PlayerView,
            RenamePlayerRequest,
        },
        state::MutationResponse,
    },
    error::AppError,
    services::{queue_service, sse_events},
    state::SharedState,
};

/// Waiting queue endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/queue", post(join_queue))
        .route("/queue/{id}", put(rename_player).delete(leave_queue))
        .route("/queue/{id}/move", post(move_player))
}

/// Add a player at the back of the queue.
#[utoipa::path(
    post,
    path = "/queue",
    tag = "queue",
    request_body = JoinQueueRequest,
    responses(
        (status = 200, description = "Player queued", body = JoinQueueResponse),
        (status = 400, description = "Blank or overlong name")
    )
)]
pub async fn join_queue(
    State(state): State<SharedState>,
    Json(payload): Json<JoinQueueRequest>,
) -> Result<Json<JoinQueueResponse>, AppError> {
    payload.validate()?;
    let player = queue_service::join_queue(&state, &payload.name).await?;
    Ok(Json(JoinQueueResponse {
        player: PlayerView::from(&player),
        state: sse_events::state_snapshot(&state).await,
    }))
}

/// Remove a player from the queue.
#[utoipa::path(
    delete,
    path = "/queue/{id}",
    tag = "queue",
    params(("id" = Uuid, Path, description = "Identifier of the queued player")),
    responses((status = 200, description = "Resulting state; `applied` is false when the player was not queued", body = MutationResponse))
)]
pub async fn leave_queue(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Json<MutationResponse> {
    let applied = queue_service::leave_queue(&state, id).await.is_some();
    Json(MutationResponse {
        applied,
        state: sse_events::state_snapshot(&state).await,
    })
}

/// Rename a queued player.
#[utoipa::path(
    put,
    path = "/queue/{id}",
    tag = "queue",
    params(("id" = Uuid, Path, description = "Identifier of the queued player")),
    request_body = RenamePlayerRequest,
    responses(
        (status = 200, description = "Resulting state", body = MutationResponse),
        (status = 400, description = "Blank or overlong name")
    )
)]
pub async fn rename_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RenamePlayerRequest>,
) -> Result<Json<MutationResponse>, AppError> {
    payload.validate()?;
    let applied = queue_service::rename_player(&state, id, &payload.name)
        .await?
        .is_some();
    Ok(Json(MutationResponse {
        applied,
        state: sse_events::state_snapshot(&state).await,
    }))
}

/// Move a player one place up or down the queue.
#[utoipa::path(
    post,
    path = "/queue/{id}/move",
    tag = "queue",
    params(("id" = Uuid, Path, description = "Identifier of the queued player")),
    request_body = MovePlayerRequest,
    responses((status = 200, description = "Resulting state; `applied` is false at the queue boundary", body = MutationResponse))
)]
pub async fn move_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MovePlayerRequest>,
) -> Json<MutationResponse> {
    let applied = queue_service::reorder_player(&state, id, payload.direction.into())
        .await
        .is_some();
    Json(MutationResponse {
        applied,
        state: sse_events::state_snapshot(&state).await,
    })
}
