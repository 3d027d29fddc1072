use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        state::MutationResponse,
        table::{CreateTableResponse, GameView, RepairResponse, SwapPlayersRequest},
    },
    error::AppError,
    services::{sse_events, table_service},
    state::SharedState,
};

/// Running table endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/tables", post(create_table))
        .route("/tables/repair", post(repair_overlaps))
        .route("/tables/{id}", delete(dissolve_table))
        .route("/tables/{id}/swap", post(swap_players))
}

/// Seat the front of the queue at a new table.
#[utoipa::path(
    post,
    path = "/tables",
    tag = "tables",
    responses((status = 200, description = "Created table, absent when the queue is empty", body = CreateTableResponse))
)]
pub async fn create_table(State(state): State<SharedState>) -> Json<CreateTableResponse> {
    let game = table_service::create_table(&state).await;
    Json(CreateTableResponse {
        game: game.as_ref().map(GameView::from),
        state: sse_events::state_snapshot(&state).await,
    })
}

/// Close a table without returning its players to the queue.
#[utoipa::path(
    delete,
    path = "/tables/{id}",
    tag = "tables",
    params(("id" = Uuid, Path, description = "Identifier of the table")),
    responses((status = 200, description = "Resulting state", body = MutationResponse))
)]
pub async fn dissolve_table(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Json<MutationResponse> {
    let applied = table_service::dissolve_table(&state, id).await.is_some();
    Json(MutationResponse {
        applied,
        state: sse_events::state_snapshot(&state).await,
    })
}

/// Replace leaving players with the front of the queue.
#[utoipa::path(
    post,
    path = "/tables/{id}/swap",
    tag = "tables",
    params(("id" = Uuid, Path, description = "Identifier of the table")),
    request_body = SwapPlayersRequest,
    responses(
        (status = 200, description = "Resulting state", body = MutationResponse),
        (status = 400, description = "More leaving players than seats")
    )
)]
pub async fn swap_players(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SwapPlayersRequest>,
) -> Result<Json<MutationResponse>, AppError> {
    payload.validate()?;
    let applied = table_service::swap_players(&state, id, &payload.leaving_ids)
        .await
        .is_some();
    Ok(Json(MutationResponse {
        applied,
        state: sse_events::state_snapshot(&state).await,
    }))
}

/// Remove queue entries whose players are already seated.
#[utoipa::path(
    post,
    path = "/tables/repair",
    tag = "tables",
    responses((status = 200, description = "Removed queue entries", body = RepairResponse))
)]
pub async fn repair_overlaps(State(state): State<SharedState>) -> Json<RepairResponse> {
    let removed_ids = table_service::repair_overlaps(&state).await;
    Json(RepairResponse {
        removed_ids,
        state: sse_events::state_snapshot(&state).await,
    })
}
