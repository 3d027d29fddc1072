use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One waiting entrant as persisted in the `queue` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueRowEntity {
    /// Stable identifier, chosen by the client that created the row.
    pub id: Uuid,
    /// Display name of the entrant.
    pub name: String,
    /// Seed used by viewers to derive a generated avatar.
    pub avatar_seed: u32,
    /// Ordering key (epoch milliseconds); rewritten when players are reordered.
    pub joined_at: i64,
}

/// Lifecycle marker of a persisted table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatusEntity {
    Active,
    Finished,
}

/// One running table as persisted in the `active_games` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameRowEntity {
    /// Primary key of the table.
    pub id: Uuid,
    /// Embedded copies of the seated players, in seat order.
    pub players: Vec<QueueRowEntity>,
    /// Creation time (epoch milliseconds); never updated.
    pub start_time: i64,
    /// Whether the table is still running.
    pub status: GameStatusEntity,
}

/// Partial update applied to a queue row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueRowPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<i64>,
}

impl QueueRowPatch {
    /// Patch that only renames the row.
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            joined_at: None,
        }
    }

    /// Overlay the patch onto an existing row.
    pub fn apply_to(&self, row: &mut QueueRowEntity) {
        if let Some(name) = &self.name {
            row.name = name.clone();
        }
        if let Some(joined_at) = self.joined_at {
            row.joined_at = joined_at;
        }
    }
}

/// Partial update applied to a game row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameRowPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<QueueRowEntity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GameStatusEntity>,
}

impl GameRowPatch {
    /// Patch that replaces the seated players.
    pub fn players(players: Vec<QueueRowEntity>) -> Self {
        Self {
            players: Some(players),
            status: None,
        }
    }

    /// Overlay the patch onto an existing row.
    pub fn apply_to(&self, row: &mut GameRowEntity) {
        if let Some(players) = &self.players {
            row.players = players.clone();
        }
        if let Some(status) = self.status {
            row.status = status;
        }
    }
}

/// Sort rows the way `list_queue` must return them: ascending key, ties broken by id.
pub fn sort_queue_rows(rows: &mut [QueueRowEntity]) {
    rows.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
}

/// Sort rows the way `list_games` must return them: most recent first.
pub fn sort_game_rows(rows: &mut [GameRowEntity]) {
    rows.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| a.id.cmp(&b.id)));
}
