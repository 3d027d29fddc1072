//! In-memory copy of the queue and the running tables that viewers are shown.

use std::collections::HashSet;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::state::model::{Game, GameStatus, Player};

/// Ordered queue plus running tables.
///
/// The queue is kept sorted by [`Player::sort_key`] after every mutation; tables are kept
/// most-recently-created first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalState {
    queue: Vec<Player>,
    games: IndexMap<Uuid, Game>,
}

impl LocalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waiting players, front of the queue first.
    pub fn queue(&self) -> &[Player] {
        &self.queue
    }

    /// Running tables, most recent first.
    pub fn games(&self) -> impl Iterator<Item = &Game> {
        self.games.values()
    }

    pub fn player(&self, id: Uuid) -> Option<&Player> {
        self.queue.iter().find(|player| player.id == id)
    }

    /// Index of the player in queue order.
    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.queue.iter().position(|player| player.id == id)
    }

    pub fn game(&self, id: Uuid) -> Option<&Game> {
        self.games.get(&id)
    }

    /// The first `count` players in queue order.
    pub fn front_of_queue(&self, count: usize) -> Vec<Player> {
        self.queue.iter().take(count).cloned().collect()
    }

    /// Identifiers of every player currently seated at a table.
    pub fn seated_ids(&self) -> HashSet<Uuid> {
        self.games
            .values()
            .flat_map(|game| game.players.iter().map(|player| player.id))
            .collect()
    }

    /// Replace the whole queue. Duplicate ids keep their first occurrence.
    pub fn replace_queue(&mut self, players: Vec<Player>) {
        let mut seen = HashSet::new();
        self.queue = players
            .into_iter()
            .filter(|player| seen.insert(player.id))
            .collect();
        self.sort_queue();
    }

    /// Replace every table, keeping the given display order.
    pub fn replace_games(&mut self, games: Vec<Game>) {
        self.games = games.into_iter().map(|game| (game.id, game)).collect();
    }

    /// Add a player to the queue. Returns `false` when the id is already queued.
    pub fn insert_player(&mut self, player: Player) -> bool {
        if self.player(player.id).is_some() {
            return false;
        }
        self.queue.push(player);
        self.sort_queue();
        true
    }

    pub fn remove_player(&mut self, id: Uuid) -> Option<Player> {
        let index = self.position(id)?;
        Some(self.queue.remove(index))
    }

    /// Remove every listed player, returning the ones that were queued.
    pub fn remove_players(&mut self, ids: &[Uuid]) -> Vec<Player> {
        let (removed, kept) = std::mem::take(&mut self.queue)
            .into_iter()
            .partition(|player| ids.contains(&player.id));
        self.queue = kept;
        removed
    }

    /// Overwrite the mutable fields of a queued player. Returns `true` when anything changed.
    pub fn update_player_fields(
        &mut self,
        id: Uuid,
        name: Option<String>,
        joined_at: Option<i64>,
    ) -> bool {
        let Some(player) = self.queue.iter_mut().find(|player| player.id == id) else {
            return false;
        };

        let mut changed = false;
        if let Some(name) = name {
            if player.name != name {
                player.name = name;
                changed = true;
            }
        }
        if let Some(joined_at) = joined_at {
            if player.joined_at != joined_at {
                player.joined_at = joined_at;
                changed = true;
                self.sort_queue();
            }
        }
        changed
    }

    /// Add a table at the front of the list. Returns `false` when the id is already known.
    pub fn insert_game(&mut self, game: Game) -> bool {
        if self.games.contains_key(&game.id) {
            return false;
        }
        self.games.shift_insert(0, game.id, game);
        true
    }

    pub fn remove_game(&mut self, id: Uuid) -> Option<Game> {
        self.games.shift_remove(&id)
    }

    /// Overwrite the seated players and/or the status of a table. Returns `true` when
    /// anything changed.
    pub fn update_game_fields(
        &mut self,
        id: Uuid,
        players: Option<Vec<Player>>,
        status: Option<GameStatus>,
    ) -> bool {
        let Some(game) = self.games.get_mut(&id) else {
            return false;
        };

        let mut changed = false;
        if let Some(players) = players {
            if game.players != players {
                game.players = players;
                changed = true;
            }
        }
        if let Some(status) = status {
            if game.status != status {
                game.status = status;
                changed = true;
            }
        }
        changed
    }

    fn sort_queue(&mut self) {
        self.queue.sort_by_key(Player::sort_key);
    }
}
