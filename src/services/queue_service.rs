use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::{QueueRowEntity, QueueRowPatch},
    error::ServiceError,
    services::sync_service::{mutate_local, remote_call},
    state::{
        SharedState,
        model::{AVATAR_SEED_RANGE, MoveDirection, Player, now_ms},
    },
};

/// Add a player at the back of the queue.
///
/// The ordering key is the current time, bumped past the back of the queue when the clock has
/// not moved so that neighbours never share a key.
pub async fn join_queue(state: &SharedState, name: &str) -> Result<Player, ServiceError> {
    let name = clean_name(name)?;
    let avatar_seed = rand::rng().random_range(AVATAR_SEED_RANGE);
    let now = now_ms();

    let (player, mode) = mutate_local(state, |local| {
        let joined_at = match local.queue().last() {
            Some(back) => now.max(back.joined_at.saturating_add(1)),
            None => now,
        };
        let player = Player::new(name, avatar_seed, joined_at);
        local.insert_player(player.clone());
        player
    })
    .await;
    info!(player_id = %player.id, name = %player.name, "player joined the queue");

    let row = QueueRowEntity::from(player.clone());
    remote_call(state, mode, "join_queue", move |store| store.insert_queue_row(row)).await;
    Ok(player)
}

/// Remove a player from the queue. Returns the removed player, or `None` when it was not queued.
pub async fn leave_queue(state: &SharedState, player_id: Uuid) -> Option<Player> {
    let (removed, mode) = mutate_local(state, |local| local.remove_player(player_id)).await;
    let Some(player) = removed else {
        debug!(player_id = %player_id, "leave ignored; player not queued");
        return None;
    };
    info!(player_id = %player_id, "player left the queue");

    remote_call(state, mode, "leave_queue", move |store| {
        store.delete_queue_row(player_id)
    })
    .await;
    Some(player)
}

/// Change the display name of a queued player.
///
/// Blank names are rejected; an unknown id is a no-op returning `None`.
pub async fn rename_player(
    state: &SharedState,
    player_id: Uuid,
    new_name: &str,
) -> Result<Option<Player>, ServiceError> {
    let name = clean_name(new_name)?;

    let (renamed, mode) = mutate_local(state, |local| {
        local.update_player_fields(player_id, Some(name.clone()), None);
        local.player(player_id).cloned()
    })
    .await;
    let Some(player) = renamed else {
        debug!(player_id = %player_id, "rename ignored; player not queued");
        return Ok(None);
    };

    remote_call(state, mode, "rename_player", move |store| {
        store.update_queue_row(player_id, QueueRowPatch::rename(name))
    })
    .await;
    Ok(Some(player))
}

/// Swap a player with its neighbour by exchanging their ordering keys.
///
/// Returns the two rewritten players, or `None` at the queue boundary or for an unknown id.
pub async fn reorder_player(
    state: &SharedState,
    player_id: Uuid,
    direction: MoveDirection,
) -> Option<(Player, Player)> {
    let (swapped, mode) = mutate_local(state, |local| {
        let index = local.position(player_id)?;
        let neighbour_index = match direction {
            MoveDirection::Up => index.checked_sub(1)?,
            MoveDirection::Down => index + 1,
        };
        let current = local.queue().get(index)?.clone();
        let neighbour = local.queue().get(neighbour_index)?.clone();

        local.update_player_fields(current.id, None, Some(neighbour.joined_at));
        local.update_player_fields(neighbour.id, None, Some(current.joined_at));

        let moved = local.player(current.id).cloned()?;
        let displaced = local.player(neighbour.id).cloned()?;
        Some((moved, displaced))
    })
    .await;

    let Some((moved, displaced)) = swapped else {
        debug!(player_id = %player_id, ?direction, "reorder ignored; nothing to swap with");
        return None;
    };

    let rows = vec![
        QueueRowEntity::from(moved.clone()),
        QueueRowEntity::from(displaced.clone()),
    ];
    remote_call(state, mode, "reorder_player", move |store| {
        store.upsert_queue_rows(rows)
    })
    .await;
    Some((moved, displaced))
}

fn clean_name(name: &str) -> Result<String, ServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(
            "display name must not be blank".into(),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AssistantConfig,
        dao::{
            queue_store::memory::{MemoryQueueStore, StoreOp},
            snapshot::MemorySnapshotStore,
        },
        state::{AppState, model::Mode},
    };

    fn local_only() -> SharedState {
        AppState::new(
            Mode::LocalOnly,
            Arc::new(MemorySnapshotStore::new()),
            AssistantConfig::default(),
        )
    }

    async fn connected(store: &MemoryQueueStore) -> SharedState {
        let state = AppState::new(
            Mode::Connected,
            Arc::new(MemorySnapshotStore::new()),
            AssistantConfig::default(),
        );
        state.install_queue_store(Arc::new(store.clone())).await;
        state
    }

    async fn names(state: &SharedState) -> Vec<String> {
        state
            .local_snapshot()
            .await
            .queue()
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    #[tokio::test]
    async fn joins_are_ordered_and_trimmed() {
        let state = local_only();
        let ada = join_queue(&state, "  Ada ").await.unwrap();
        join_queue(&state, "Bob").await.unwrap();

        assert_eq!(ada.name, "Ada");
        assert!(AVATAR_SEED_RANGE.contains(&ada.avatar_seed));
        assert_eq!(names(&state).await, ["Ada", "Bob"]);
    }

    #[tokio::test]
    async fn join_behind_a_maximal_key_does_not_overflow() {
        let state = local_only();
        let back = Player::new("Far future".into(), 1, i64::MAX);
        mutate_local(&state, |local| local.replace_queue(vec![back])).await;

        let ada = join_queue(&state, "Ada").await.unwrap();

        assert_eq!(ada.joined_at, i64::MAX);
        assert_eq!(state.local_snapshot().await.queue().len(), 2);
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let state = local_only();
        assert!(matches!(
            join_queue(&state, "   ").await,
            Err(ServiceError::InvalidInput(_))
        ));
        let ada = join_queue(&state, "Ada").await.unwrap();
        assert!(rename_player(&state, ada.id, "").await.is_err());
        assert_eq!(names(&state).await, ["Ada"]);
    }

    #[tokio::test]
    async fn reorder_is_self_inverse() {
        let state = local_only();
        join_queue(&state, "Ada").await.unwrap();
        let bob = join_queue(&state, "Bob").await.unwrap();
        let before = state.local_snapshot().await;

        assert!(reorder_player(&state, bob.id, MoveDirection::Up).await.is_some());
        assert_eq!(names(&state).await, ["Bob", "Ada"]);
        assert!(reorder_player(&state, bob.id, MoveDirection::Down).await.is_some());

        assert_eq!(state.local_snapshot().await, before);
    }

    #[tokio::test]
    async fn reorder_at_the_boundary_is_a_no_op() {
        let state = local_only();
        let ada = join_queue(&state, "Ada").await.unwrap();
        let bob = join_queue(&state, "Bob").await.unwrap();
        let before = state.local_snapshot().await;

        assert!(reorder_player(&state, ada.id, MoveDirection::Up).await.is_none());
        assert!(reorder_player(&state, bob.id, MoveDirection::Down).await.is_none());
        assert!(reorder_player(&state, Uuid::new_v4(), MoveDirection::Up).await.is_none());
        assert_eq!(state.local_snapshot().await, before);
    }

    #[tokio::test]
    async fn unknown_ids_are_no_ops() {
        let state = local_only();
        assert!(leave_queue(&state, Uuid::new_v4()).await.is_none());
        assert!(rename_player(&state, Uuid::new_v4(), "Ada").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn connected_mutations_reach_the_store() {
        let store = MemoryQueueStore::new();
        let state = connected(&store).await;

        let ada = join_queue(&state, "Ada").await.unwrap();
        let bob = join_queue(&state, "Bob").await.unwrap();
        rename_player(&state, ada.id, "Ada L.").await.unwrap();
        reorder_player(&state, bob.id, MoveDirection::Up).await;
        leave_queue(&state, ada.id).await;

        let rows = store.queue_rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, bob.id);
        assert_eq!(rows[0].joined_at, ada.joined_at);
    }

    #[tokio::test]
    async fn failed_remote_writes_keep_the_optimistic_state() {
        let store = MemoryQueueStore::new();
        store.fail_on(StoreOp::InsertQueueRow).await;
        let state = connected(&store).await;

        let ada = join_queue(&state, "Ada").await.unwrap();

        assert!(state.local_snapshot().await.player(ada.id).is_some());
        assert!(store.queue_rows().await.is_empty());
    }
}
