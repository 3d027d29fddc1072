use std::ops::Range;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{GameRowEntity, GameStatusEntity, QueueRowEntity};

/// Number of seats at a table.
pub const TABLE_SEATS: usize = 4;
/// Range the avatar seed of a new player is drawn from.
pub const AVATAR_SEED_RANGE: Range<u32> = 0..1000;

/// A waiting entrant in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Stable identifier, unique across the queue and every table.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Seed from which viewers derive a generated avatar.
    pub avatar_seed: u32,
    /// Queue ordering key in epoch milliseconds. Reordering swaps these values between
    /// neighbours, so this is not an arrival time.
    pub joined_at: i64,
}

impl Player {
    /// Build a fresh player with a newly allocated identifier.
    pub fn new(name: String, avatar_seed: u32, joined_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            avatar_seed,
            joined_at,
        }
    }

    /// Total queue order: ordering key first, identifier as tie-breaker.
    pub fn sort_key(&self) -> (i64, Uuid) {
        (self.joined_at, self.id)
    }
}

/// Lifecycle of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Active,
    Finished,
}

/// A running table of up to [`TABLE_SEATS`] players.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    /// Primary key of the table.
    pub id: Uuid,
    /// Seated players in seat order. These are copies owned by the table.
    pub players: Vec<Player>,
    /// Creation time in epoch milliseconds.
    pub start_time: i64,
    pub status: GameStatus,
}

impl Game {
    /// Open a new active table seating `players`.
    pub fn new(players: Vec<Player>, start_time: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            players,
            start_time,
            status: GameStatus::Active,
        }
    }

    /// Number of empty seats.
    pub fn open_seats(&self) -> usize {
        TABLE_SEATS.saturating_sub(self.players.len())
    }
}

/// Whether the engine talks to the remote store or keeps everything in a local snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Mutations are written to the remote store and remote changes are reconciled.
    #[default]
    Connected,
    /// Mutations stay local and are persisted to the snapshot store.
    LocalOnly,
}

/// Direction of a manual reorder in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    /// Towards the front of the queue.
    Up,
    /// Towards the back of the queue.
    Down,
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

impl From<QueueRowEntity> for Player {
    fn from(value: QueueRowEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            avatar_seed: value.avatar_seed,
            joined_at: value.joined_at,
        }
    }
}

impl From<Player> for QueueRowEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
            avatar_seed: value.avatar_seed,
            joined_at: value.joined_at,
        }
    }
}

impl From<GameStatusEntity> for GameStatus {
    fn from(value: GameStatusEntity) -> Self {
        match value {
            GameStatusEntity::Active => GameStatus::Active,
            GameStatusEntity::Finished => GameStatus::Finished,
        }
    }
}

impl From<GameStatus> for GameStatusEntity {
    fn from(value: GameStatus) -> Self {
        match value {
            GameStatus::Active => GameStatusEntity::Active,
            GameStatus::Finished => GameStatusEntity::Finished,
        }
    }
}

impl From<GameRowEntity> for Game {
    fn from(value: GameRowEntity) -> Self {
        Self {
            id: value.id,
            players: value.players.into_iter().map(Into::into).collect(),
            start_time: value.start_time,
            status: value.status.into(),
        }
    }
}

impl From<Game> for GameRowEntity {
    fn from(value: Game) -> Self {
        Self {
            id: value.id,
            players: value.players.into_iter().map(Into::into).collect(),
            start_time: value.start_time,
            status: value.status.into(),
        }
    }
}
