use axum::{Json, Router, extract::State, routing::post};
use validator::Validate;

use crate::{
    dto::assistant::{AssistantRequest, AssistantResponse},
    error::AppError,
    services::assistant_service,
    state::SharedState,
};

#[utoipa::path(
    post,
    path = "/assistant",
    tag = "assistant",
    request_body = AssistantRequest,
    responses(
        (status = 200, description = "Answer, or a fallback line when the assistant is unavailable", body = AssistantResponse),
        (status = 400, description = "Empty or overlong question")
    )
)]
/// Ask the rules assistant a question.
pub async fn ask(
    State(state): State<SharedState>,
    Json(payload): Json<AssistantRequest>,
) -> Result<Json<AssistantResponse>, AppError> {
    payload.validate()?;
    let answer = assistant_service::ask(&state, &payload.question).await;
    Ok(Json(AssistantResponse { answer }))
}

pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/assistant", post(ask))
}
