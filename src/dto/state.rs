//! Full state snapshot shown to viewers.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::{queue::PlayerView, table::GameView},
    state::{local::LocalState, model::{GameStatus, Mode}},
};

/// Everything a viewer needs to render the queue and the tables.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StateSnapshot {
    pub mode: Mode,
    /// Connected mode without a live storage connection.
    pub degraded: bool,
    /// A remote table is missing and must be provisioned.
    pub setup_required: bool,
    /// Names of the remote tables reported missing.
    pub missing_tables: Vec<String>,
    /// Waiting players, front of the queue first.
    pub queue: Vec<PlayerView>,
    /// Running tables, most recent first.
    pub games: Vec<GameView>,
    pub queue_count: usize,
    pub active_games_count: usize,
}

/// Connection flags carried alongside the local collections.
#[derive(Debug, Clone, Default)]
pub struct SyncFlags {
    pub degraded: bool,
    pub missing_tables: Vec<String>,
}

impl StateSnapshot {
    pub fn build(mode: Mode, flags: SyncFlags, local: &LocalState) -> Self {
        let queue = local.queue().iter().map(PlayerView::from).collect::<Vec<_>>();
        let games = local.games().map(GameView::from).collect::<Vec<_>>();
        let active_games_count = local
            .games()
            .filter(|game| game.status == GameStatus::Active)
            .count();

        Self {
            mode,
            degraded: flags.degraded,
            setup_required: !flags.missing_tables.is_empty(),
            missing_tables: flags.missing_tables,
            queue_count: queue.len(),
            queue,
            games,
            active_games_count,
        }
    }
}

/// Result of a mutation: whether anything changed plus the resulting state.
#[derive(Debug, Serialize, ToSchema)]
pub struct MutationResponse {
    pub applied: bool,
    pub state: StateSnapshot,
}
