use serde::Serialize;
use utoipa::ToSchema;

use crate::state::model::Mode;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok", "degraded" or "setup_required").
    pub status: String,
    pub mode: Mode,
}

impl HealthResponse {
    pub fn ok(mode: Mode) -> Self {
        Self::with_status("ok", mode)
    }

    /// Connected mode without a live storage connection.
    pub fn degraded(mode: Mode) -> Self {
        Self::with_status("degraded", mode)
    }

    /// Storage reachable but a table has not been provisioned.
    pub fn setup_required(mode: Mode) -> Self {
        Self::with_status("setup_required", mode)
    }

    fn with_status(status: &str, mode: Mode) -> Self {
        Self {
            status: status.to_string(),
            mode,
        }
    }
}
