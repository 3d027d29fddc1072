//! DTOs for the running tables.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{format_epoch_ms, queue::PlayerView, state::StateSnapshot},
    state::model::{Game, GameStatus, TABLE_SEATS},
};

const MAX_LEAVING: u64 = TABLE_SEATS as u64;

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatusDto {
    Active,
    Finished,
}

impl From<GameStatus> for GameStatusDto {
    fn from(value: GameStatus) -> Self {
        match value {
            GameStatus::Active => GameStatusDto::Active,
            GameStatus::Finished => GameStatusDto::Finished,
        }
    }
}

/// Public projection of a table.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameView {
    pub id: Uuid,
    /// Seated players in seat order.
    pub players: Vec<PlayerView>,
    /// Creation time in epoch milliseconds.
    pub start_time: i64,
    /// Creation time rendered as RFC 3339.
    pub started_at: String,
    pub status: GameStatusDto,
    pub open_seats: usize,
}

impl From<&Game> for GameView {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id,
            players: game.players.iter().map(PlayerView::from).collect(),
            start_time: game.start_time,
            started_at: format_epoch_ms(game.start_time),
            status: game.status.into(),
            open_seats: game.open_seats(),
        }
    }
}

/// Request to replace leaving players with the front of the queue.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct SwapPlayersRequest {
    /// Players standing up from the table. May be empty.
    #[serde(default)]
    #[validate(length(max = MAX_LEAVING))]
    pub leaving_ids: Vec<Uuid>,
}

/// Response to a table creation. `game` is absent when the queue was empty.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateTableResponse {
    pub game: Option<GameView>,
    pub state: StateSnapshot,
}

/// Response to the overlap repair sweep.
#[derive(Debug, Serialize, ToSchema)]
pub struct RepairResponse {
    /// Queue entries removed because they were already seated.
    pub removed_ids: Vec<Uuid>,
    pub state: StateSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(leaving: usize) -> SwapPlayersRequest {
        SwapPlayersRequest {
            leaving_ids: (0..leaving).map(|_| Uuid::new_v4()).collect(),
        }
    }

    #[test]
    fn at_most_a_full_table_may_leave() {
        assert!(request(0).validate().is_ok());
        assert!(request(TABLE_SEATS).validate().is_ok());
        assert!(request(TABLE_SEATS + 1).validate().is_err());
    }
}
