//! Folds remote change events into the local state.
//!
//! Every event is applied idempotently: inserting a known id, deleting or updating an absent
//! id, and updates carrying values that are already present all leave the state untouched.
//! This is what lets a host receive the echo of its own optimistic mutations safely.

use crate::{
    dao::{
        models::{GameRowEntity, QueueRowEntity},
        queue_store::RowChange,
    },
    state::{
        local::LocalState,
        model::{Game, Player},
    },
};

/// A change observed on one of the two remote tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteChange {
    Queue(RowChange<QueueRowEntity>),
    Game(RowChange<GameRowEntity>),
}

impl RemoteChange {
    pub fn table(&self) -> &'static str {
        match self {
            RemoteChange::Queue(_) => crate::dao::queue_store::QUEUE_TABLE,
            RemoteChange::Game(_) => crate::dao::queue_store::GAMES_TABLE,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RemoteChange::Queue(change) => change.kind(),
            RemoteChange::Game(change) => change.kind(),
        }
    }
}

/// Outcome of folding one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The local state changed.
    Applied,
    /// The event was already reflected locally.
    Ignored,
}

impl From<bool> for Reconciled {
    fn from(changed: bool) -> Self {
        if changed {
            Reconciled::Applied
        } else {
            Reconciled::Ignored
        }
    }
}

/// Apply a single remote event to `state`.
pub fn apply_change(state: &mut LocalState, change: RemoteChange) -> Reconciled {
    match change {
        RemoteChange::Queue(RowChange::Insert(row)) => state.insert_player(Player::from(row)).into(),
        RemoteChange::Queue(RowChange::Delete(id)) => state.remove_player(id).is_some().into(),
        RemoteChange::Queue(RowChange::Update(row)) => state
            .update_player_fields(row.id, Some(row.name), Some(row.joined_at))
            .into(),
        RemoteChange::Game(RowChange::Insert(row)) => state.insert_game(Game::from(row)).into(),
        RemoteChange::Game(RowChange::Delete(id)) => state.remove_game(id).is_some().into(),
        RemoteChange::Game(RowChange::Update(row)) => {
            let game = Game::from(row);
            state
                .update_game_fields(game.id, Some(game.players), Some(game.status))
                .into()
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::dao::models::GameStatusEntity;

    fn row(name: &str, joined_at: i64) -> QueueRowEntity {
        QueueRowEntity {
            id: Uuid::new_v4(),
            name: name.into(),
            avatar_seed: 7,
            joined_at,
        }
    }

    fn game_row(players: Vec<QueueRowEntity>) -> GameRowEntity {
        GameRowEntity {
            id: Uuid::new_v4(),
            players,
            start_time: 1_000,
            status: GameStatusEntity::Active,
        }
    }

    #[test]
    fn queue_insert_is_applied_once() {
        let mut state = LocalState::new();
        let ada = row("Ada", 10);

        let first = apply_change(&mut state, RemoteChange::Queue(RowChange::Insert(ada.clone())));
        let echo = apply_change(&mut state, RemoteChange::Queue(RowChange::Insert(ada)));

        assert_eq!(first, Reconciled::Applied);
        assert_eq!(echo, Reconciled::Ignored);
        assert_eq!(state.queue().len(), 1);
    }

    #[test]
    fn queue_update_overwrites_name_and_key() {
        let mut state = LocalState::new();
        let ada = row("Ada", 10);
        let bob = row("Bob", 20);
        apply_change(&mut state, RemoteChange::Queue(RowChange::Insert(ada.clone())));
        apply_change(&mut state, RemoteChange::Queue(RowChange::Insert(bob.clone())));

        let moved = QueueRowEntity {
            name: "Ada L.".into(),
            joined_at: 30,
            ..ada.clone()
        };
        let outcome = apply_change(&mut state, RemoteChange::Queue(RowChange::Update(moved.clone())));

        assert_eq!(outcome, Reconciled::Applied);
        assert_eq!(state.queue()[0].id, bob.id);
        assert_eq!(state.queue()[1].name, "Ada L.");
        assert_eq!(
            apply_change(&mut state, RemoteChange::Queue(RowChange::Update(moved))),
            Reconciled::Ignored
        );
    }

    #[test]
    fn events_for_unknown_ids_are_ignored() {
        let mut state = LocalState::new();
        let stray = row("Ghost", 1);

        assert_eq!(
            apply_change(&mut state, RemoteChange::Queue(RowChange::Update(stray.clone()))),
            Reconciled::Ignored
        );
        assert_eq!(
            apply_change(&mut state, RemoteChange::Queue(RowChange::Delete(stray.id))),
            Reconciled::Ignored
        );
        assert_eq!(
            apply_change(&mut state, RemoteChange::Game(RowChange::Delete(Uuid::new_v4()))),
            Reconciled::Ignored
        );
        assert_eq!(
            apply_change(&mut state, RemoteChange::Game(RowChange::Update(game_row(vec![])))),
            Reconciled::Ignored
        );
        assert_eq!(state, LocalState::new());
    }

    #[test]
    fn game_events_follow_the_table_lifecycle() {
        let mut state = LocalState::new();
        let game = game_row(vec![row("Ada", 1), row("Bob", 2)]);

        apply_change(&mut state, RemoteChange::Game(RowChange::Insert(game.clone())));
        assert_eq!(
            apply_change(&mut state, RemoteChange::Game(RowChange::Insert(game.clone()))),
            Reconciled::Ignored
        );

        let swapped = GameRowEntity {
            players: vec![row("Cy", 3)],
            ..game.clone()
        };
        assert_eq!(
            apply_change(&mut state, RemoteChange::Game(RowChange::Update(swapped))),
            Reconciled::Applied
        );
        assert_eq!(state.game(game.id).map(|g| g.players.len()), Some(1));

        assert_eq!(
            apply_change(&mut state, RemoteChange::Game(RowChange::Delete(game.id))),
            Reconciled::Applied
        );
        assert!(state.game(game.id).is_none());
    }

    #[test]
    fn replaying_a_sequence_converges() {
        let ada = row("Ada", 10);
        let game = game_row(vec![ada.clone()]);
        let events = vec![
            RemoteChange::Queue(RowChange::Insert(ada.clone())),
            RemoteChange::Game(RowChange::Insert(game.clone())),
            RemoteChange::Queue(RowChange::Delete(ada.id)),
        ];

        let mut once = LocalState::new();
        for event in events.iter().cloned() {
            apply_change(&mut once, event);
        }
        let mut twice = once.clone();
        for event in events {
            apply_change(&mut twice, event);
        }

        assert_eq!(once, twice);
        assert!(once.queue().is_empty());
        assert!(once.game(game.id).is_some());
    }
}
