//! Table lifecycle: promote the front of the queue, swap players in and out, dissolve, and
//! heal queue entries left behind by a half-applied promotion.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{GameRowEntity, GameRowPatch, QueueRowEntity},
    services::sync_service::{
        RemoteCall, mutate_local, note_storage_error, remote_call, remote_target,
    },
    state::{
        SharedState,
        model::{Game, Player, TABLE_SEATS, now_ms},
    },
};

/// Seat the first (up to four) queued players at a new table.
///
/// Returns `None` when the queue is empty. Remotely the game row is written first and the queue
/// rows are only deleted once it has been accepted.
pub async fn create_table(state: &SharedState) -> Option<Game> {
    let start_time = now_ms();
    let (created, mode) = mutate_local(state, |local| {
        let seated = local.front_of_queue(TABLE_SEATS);
        if seated.is_empty() {
            return None;
        }
        let ids = seated.iter().map(|player| player.id).collect::<Vec<_>>();
        local.remove_players(&ids);
        let game = Game::new(seated, start_time);
        local.insert_game(game.clone());
        Some(game)
    })
    .await;

    let Some(game) = created else {
        debug!("create_table ignored; queue is empty");
        return None;
    };
    info!(game_id = %game.id, players = game.players.len(), "table created");

    let row = GameRowEntity::from(game.clone());
    let inserted = remote_call(state, mode, "create_table", move |store| {
        store.insert_game_row(row)
    })
    .await;
    if inserted.is_done() {
        let ids = game.players.iter().map(|player| player.id).collect::<Vec<_>>();
        remote_call(state, mode, "create_table.dequeue", move |store| {
            store.delete_queue_rows(ids)
        })
        .await;
    } else if matches!(inserted, RemoteCall::Failed) {
        warn!(game_id = %game.id, "game row not written; seated players stay queued remotely");
    }

    Some(game)
}

/// Close a table. Its players are not returned to the queue.
pub async fn dissolve_table(state: &SharedState, game_id: Uuid) -> Option<Game> {
    let (removed, mode) = mutate_local(state, |local| local.remove_game(game_id)).await;
    let Some(game) = removed else {
        debug!(game_id = %game_id, "dissolve ignored; table not found");
        return None;
    };
    info!(game_id = %game_id, "table dissolved");

    remote_call(state, mode, "dissolve_table", move |store| {
        store.delete_game_row(game_id)
    })
    .await;
    Some(game)
}

/// Replace `leaving_ids` at a table with the front of the queue.
///
/// In connected mode the refill is drawn from a fresh remote read of the queue front; when that
/// read fails nobody is drawn. Returns the updated table, or `None` when it does not exist.
pub async fn swap_players(state: &SharedState, game_id: Uuid, leaving_ids: &[Uuid]) -> Option<Game> {
    let kept = {
        let local = state.local().read().await;
        let game = local.game(game_id)?;
        game.players
            .iter()
            .filter(|player| !leaving_ids.contains(&player.id))
            .cloned()
            .collect::<Vec<_>>()
    };
    let slots = TABLE_SEATS.saturating_sub(kept.len());

    let drawn = if slots == 0 {
        Vec::new()
    } else {
        draw_front_of_queue(state, slots).await
    };

    let (updated, mode) = mutate_local(state, |local| {
        local.game(game_id)?;
        let drawn_ids = drawn.iter().map(|player| player.id).collect::<Vec<_>>();
        local.remove_players(&drawn_ids);
        let players = kept.iter().chain(drawn.iter()).cloned().collect::<Vec<_>>();
        local.update_game_fields(game_id, Some(players), None);
        local.game(game_id).cloned()
    })
    .await;

    let Some(game) = updated else {
        debug!(game_id = %game_id, "swap ignored; table not found");
        return None;
    };
    info!(
        game_id = %game_id,
        leaving = leaving_ids.len(),
        drawn = drawn.len(),
        "players swapped"
    );

    let seated = game
        .players
        .iter()
        .cloned()
        .map(QueueRowEntity::from)
        .collect::<Vec<_>>();
    let written = remote_call(state, mode, "swap_players", move |store| {
        store.update_game_row(game_id, GameRowPatch::players(seated))
    })
    .await;
    if written.is_done() && !drawn.is_empty() {
        let ids = drawn.iter().map(|player| player.id).collect::<Vec<_>>();
        remote_call(state, mode, "swap_players.dequeue", move |store| {
            store.delete_queue_rows(ids)
        })
        .await;
    }

    Some(game)
}

/// Remove queue entries whose players are already seated at a table, locally and remotely.
///
/// Returns the removed ids.
pub async fn repair_overlaps(state: &SharedState) -> Vec<Uuid> {
    let overlapping = {
        let local = state.local().read().await;
        let seated = local.seated_ids();
        local
            .queue()
            .iter()
            .filter(|player| seated.contains(&player.id))
            .map(|player| player.id)
            .collect::<Vec<_>>()
    };
    if overlapping.is_empty() {
        return overlapping;
    }

    let (_, mode) = mutate_local(state, |local| local.remove_players(&overlapping)).await;
    warn!(count = overlapping.len(), "removed queue entries already seated at a table");

    let ids = overlapping.clone();
    remote_call(state, mode, "repair_overlaps", move |store| {
        store.delete_queue_rows(ids)
    })
    .await;
    overlapping
}

async fn draw_front_of_queue(state: &SharedState, slots: usize) -> Vec<Player> {
    let mode = state.mode().await;
    let Some(store) = remote_target(state, mode, "swap_players.draw").await else {
        return state.local().read().await.front_of_queue(slots);
    };

    match store.list_queue_front(slots).await {
        Ok(rows) => rows.into_iter().map(Player::from).collect(),
        Err(err) => {
            note_storage_error(state, "swap_players.draw", &err).await;
            Vec::new()
        }
    }
}
