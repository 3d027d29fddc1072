use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Question for the rules assistant.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AssistantRequest {
    #[validate(length(min = 1, max = 1000))]
    pub question: String,
}

/// Answer from the rules assistant, or a fallback line when it is unavailable.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssistantResponse {
    pub answer: String,
}
