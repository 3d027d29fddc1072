use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::model::Mode;

/// Current operating mode.
#[derive(Debug, Serialize, ToSchema)]
pub struct ModeView {
    pub mode: Mode,
    pub degraded: bool,
}

/// Request to switch between connected and local-only operation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SwitchModeRequest {
    pub mode: Mode,
}
