//! DTOs for the waiting queue endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{state::StateSnapshot, validation::validate_display_name},
    state::model::{MoveDirection, Player},
};

/// Request to add a new player at the back of the queue.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinQueueRequest {
    #[validate(custom(function = "validate_display_name"))]
    pub name: String,
}

/// Request to change the display name of a queued player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RenamePlayerRequest {
    #[validate(custom(function = "validate_display_name"))]
    pub name: String,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirectionDto {
    Up,
    Down,
}

impl From<MoveDirectionDto> for MoveDirection {
    fn from(value: MoveDirectionDto) -> Self {
        match value {
            MoveDirectionDto::Up => MoveDirection::Up,
            MoveDirectionDto::Down => MoveDirection::Down,
        }
    }
}

/// Request to swap a player with its neighbour.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MovePlayerRequest {
    pub direction: MoveDirectionDto,
}

/// Public projection of a player, queued or seated.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerView {
    pub id: Uuid,
    pub name: String,
    pub avatar_seed: u32,
    /// Ordering key in epoch milliseconds.
    pub joined_at: i64,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            avatar_seed: player.avatar_seed,
            joined_at: player.joined_at,
        }
    }
}

/// Response to a join: the created player plus the resulting state.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinQueueResponse {
    pub player: PlayerView,
    pub state: StateSnapshot,
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;

    #[test]
    fn blank_join_requests_fail_validation() {
        let request = JoinQueueRequest { name: "   ".into() };
        assert!(request.validate().is_err());
    }

    #[test]
    fn move_direction_is_snake_case() {
        let request: MovePlayerRequest = serde_json::from_str(r#"{"direction":"down"}"#).unwrap();
        assert_eq!(MoveDirection::from(request.direction), MoveDirection::Down);
    }
}
