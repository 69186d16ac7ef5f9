//! Game library management: accepted games, the rejected list and their cached names.

use tracing::info;

use crate::{
    dao::models::{AppId, GameEntity, GameFields, RejectedEntity, RejectedValue, now_ms},
    dto::track::GameStatus,
    error::ServiceError,
    state::SharedState,
};

/// Mode given to games added without one.
pub const DEFAULT_GAME_MODE: u8 = 1;

/// Result of a client reporting the application it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Rejected,
    Known(GameFields),
    Added(GameFields),
}

/// Insert or replace a library entry with a fresh `createdAt`.
pub async fn add_game(
    state: &SharedState,
    app_id: AppId,
    mode: Option<u8>,
) -> Result<GameFields, ServiceError> {
    let mode = checked_mode(mode)?;
    let store = state.require_tracker_store().await?;
    let fields = GameFields {
        mode,
        created_at: now_ms(),
    };
    store
        .upsert_game(GameEntity {
            app_id: app_id.clone(),
            fields,
        })
        .await?;
    state.snapshots().invalidate().await;
    info!(app_id = %app_id, mode, "game added");
    Ok(fields)
}

/// Delete a library entry and its cached display name.
pub async fn remove_game(state: &SharedState, app_id: AppId) -> Result<(), ServiceError> {
    let store = state.require_tracker_store().await?;
    store.delete_games(app_id.clone()).await?;
    store.delete_names(app_id.clone()).await?;
    state.snapshots().invalidate().await;
    info!(app_id = %app_id, "game removed");
    Ok(())
}

/// Move an application to the rejected list, preserving its library fields when present.
pub async fn reject_game(state: &SharedState, app_id: AppId) -> Result<RejectedValue, ServiceError> {
    let store = state.require_tracker_store().await?;
    let value = match store.find_game(app_id.clone()).await? {
        Some(game) => {
            store.delete_games(app_id.clone()).await?;
            RejectedValue::Preserved(game.fields)
        }
        None => RejectedValue::Flag(true),
    };

    store.delete_rejected(app_id.clone()).await?;
    store
        .upsert_rejected(RejectedEntity {
            app_id: app_id.clone(),
            value,
        })
        .await?;
    store.delete_names(app_id.clone()).await?;
    state.snapshots().invalidate().await;
    info!(app_id = %app_id, preserved = value.preserved().is_some(), "game rejected");
    Ok(value)
}

/// Lift a rejection, restoring the preserved game with a fresh `createdAt` when there is one.
pub async fn unreject_game(
    state: &SharedState,
    app_id: AppId,
) -> Result<Option<GameFields>, ServiceError> {
    let store = state.require_tracker_store().await?;
    let rejected = store.find_rejected(app_id.clone()).await?;
    store.delete_rejected(app_id.clone()).await?;
    store.delete_names(app_id.clone()).await?;

    let restored = match rejected.and_then(|entry| entry.value.preserved()) {
        Some(preserved) => {
            let fields = GameFields {
                mode: preserved.mode,
                created_at: now_ms(),
            };
            store
                .upsert_game(GameEntity {
                    app_id: app_id.clone(),
                    fields,
                })
                .await?;
            Some(fields)
        }
        None => None,
    };

    state.snapshots().invalidate().await;
    info!(app_id = %app_id, restored = restored.is_some(), "game unrejected");
    Ok(restored)
}

/// Handle a client report: rejected ids are refused, known ids returned, others added.
pub async fn report_game(
    state: &SharedState,
    app_id: AppId,
    mode: Option<u8>,
) -> Result<ReportOutcome, ServiceError> {
    let store = state.require_tracker_store().await?;
    if store.find_rejected(app_id.clone()).await?.is_some() {
        return Ok(ReportOutcome::Rejected);
    }
    if let Some(game) = store.find_game(app_id.clone()).await? {
        return Ok(ReportOutcome::Known(game.fields));
    }
    let fields = add_game(state, app_id, mode).await?;
    Ok(ReportOutcome::Added(fields))
}

/// Library status of `app_id`, with its fields when it is a known game.
pub async fn game_status(
    state: &SharedState,
    app_id: AppId,
) -> Result<(GameStatus, Option<GameFields>), ServiceError> {
    let store = state.require_tracker_store().await?;
    if store.find_rejected(app_id.clone()).await?.is_some() {
        return Ok((GameStatus::Rejected, None));
    }
    Ok(match store.find_game(app_id).await? {
        Some(game) => (GameStatus::Known, Some(game.fields)),
        None => (GameStatus::Unknown, None),
    })
}

fn checked_mode(mode: Option<u8>) -> Result<u8, ServiceError> {
    match mode.unwrap_or(DEFAULT_GAME_MODE) {
        mode @ (0 | 1) => Ok(mode),
        other => Err(ServiceError::InvalidInput(format!(
            "unsupported game mode {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::tracker_store::{TrackerStore, memory::MemoryTrackerStore},
        services::name_lookup::SteamNameLookup,
        state::AppState,
    };

    async fn setup() -> (MemoryTrackerStore, SharedState) {
        let store = MemoryTrackerStore::new();
        let state = AppState::with_store(
            AppConfig::default(),
            Arc::new(SteamNameLookup::new("http://127.0.0.1:9/appdetails")),
            Arc::new(store.clone()),
        )
        .await;
        (store, state)
    }

    fn id(raw: &str) -> AppId {
        AppId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn adding_twice_keeps_a_single_entry() {
        let (store, state) = setup().await;
        add_game(&state, id("570"), Some(0)).await.unwrap();
        add_game(&state, id("570"), Some(0)).await.unwrap();

        let games = store.list_games().await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].fields.mode, 0);
    }

    #[tokio::test]
    async fn mode_defaults_to_one_and_rejects_unknown_values() {
        let (_store, state) = setup().await;
        assert_eq!(add_game(&state, id("10"), None).await.unwrap().mode, 1);
        assert!(matches!(
            add_game(&state, id("10"), Some(5)).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn reject_then_unreject_restores_the_mode() {
        let (store, state) = setup().await;
        add_game(&state, id("570"), Some(0)).await.unwrap();
        store.set_name(id("570"), "Dota 2".into()).await.unwrap();

        let value = reject_game(&state, id("570")).await.unwrap();
        assert_eq!(value.preserved().map(|fields| fields.mode), Some(0));
        assert!(store.find_game(id("570")).await.unwrap().is_none());
        assert!(store.get_name(id("570")).await.unwrap().is_none());

        let restored = unreject_game(&state, id("570")).await.unwrap();
        assert_eq!(restored.map(|fields| fields.mode), Some(0));
        assert!(store.find_rejected(id("570")).await.unwrap().is_none());
        assert_eq!(
            store.find_game(id("570")).await.unwrap().map(|g| g.fields.mode),
            Some(0)
        );
    }

    #[tokio::test]
    async fn rejecting_an_unknown_id_stores_the_sentinel() {
        let (store, state) = setup().await;
        let value = reject_game(&state, id("999")).await.unwrap();
        assert_eq!(value, RejectedValue::Flag(true));
        assert!(store.find_game(id("999")).await.unwrap().is_none());

        assert_eq!(unreject_game(&state, id("999")).await.unwrap(), None);
        assert!(store.list_games().await.unwrap().is_empty());
        assert!(store.list_rejected().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn report_refuses_rejected_and_adds_unknown_games() {
        let (_store, state) = setup().await;
        reject_game(&state, id("1")).await.unwrap();
        assert_eq!(
            report_game(&state, id("1"), None).await.unwrap(),
            ReportOutcome::Rejected
        );

        let added = report_game(&state, id("2"), None).await.unwrap();
        let ReportOutcome::Added(fields) = added else {
            panic!("expected a new game, got {added:?}");
        };
        assert_eq!(fields.mode, 1);
        assert_eq!(
            report_game(&state, id("2"), Some(0)).await.unwrap(),
            ReportOutcome::Known(fields)
        );
    }

    #[tokio::test]
    async fn status_reflects_the_library() {
        let (_store, state) = setup().await;
        add_game(&state, id("570"), None).await.unwrap();
        reject_game(&state, id("730")).await.unwrap();

        assert_eq!(game_status(&state, id("570")).await.unwrap().0, GameStatus::Known);
        assert_eq!(game_status(&state, id("730")).await.unwrap().0, GameStatus::Rejected);
        assert_eq!(game_status(&state, id("440")).await.unwrap().0, GameStatus::Unknown);
    }
}
