//! Administrative snapshot: aggregation of every collection behind the response cache.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
    dao::{
        models::{AddressEntity, AppId, TimestampMs, now_ms},
        storage::StorageResult,
        tracker_store::TrackerStore,
    },
    dto::snapshot::{AddressView, AdminSnapshot, BannedAddressView, DbInfo},
    error::ServiceError,
    services::presence_service::active_since,
    state::SharedState,
};

/// Snapshot plus the ids whose display name is still unknown.
#[derive(Debug)]
pub struct BuiltSnapshot {
    pub snapshot: AdminSnapshot,
    pub missing_names: Vec<AppId>,
}

/// Read every collection and assemble the dashboard view. `dbInfo` is left unset.
pub async fn build_snapshot(
    store: &dyn TrackerStore,
    active_since: TimestampMs,
) -> StorageResult<BuiltSnapshot> {
    let (active, games, rejected, banned, banned_serials, seen, names) = futures::try_join!(
        store.find_active_addresses(active_since),
        store.list_games(),
        store.list_rejected(),
        store.list_banned_addresses(),
        store.list_banned_serials(),
        store.list_addresses(),
        store.list_names(),
    )?;

    let seen = by_recency(seen);
    let banned = banned
        .into_iter()
        .map(|ip| {
            let view = seen
                .get(&ip)
                .map(|record| BannedAddressView {
                    serial: record.serial.clone(),
                    usernames: Some(record.usernames.clone()),
                })
                .unwrap_or_default();
            (ip, view)
        })
        .collect();

    let mut games = games;
    games.sort_by(|a, b| a.app_id.cmp(&b.app_id));
    let mut rejected = rejected;
    rejected.sort_by(|a, b| a.app_id.cmp(&b.app_id));
    let names: HashMap<AppId, String> = names
        .into_iter()
        .map(|entry| (entry.app_id, entry.name))
        .collect();

    let mut pending = HashSet::new();
    let missing_names = games
        .iter()
        .map(|game| &game.app_id)
        .chain(rejected.iter().map(|entry| &entry.app_id))
        .filter(|id| !names.contains_key(*id) && pending.insert((*id).clone()))
        .cloned()
        .collect();

    let mut names: Vec<_> = names.into_iter().collect();
    names.sort();

    let snapshot = AdminSnapshot {
        active: by_recency(active),
        games: games
            .into_iter()
            .map(|game| (game.app_id, game.fields))
            .collect(),
        rejected: rejected
            .into_iter()
            .map(|entry| (entry.app_id, entry.value))
            .collect(),
        banned,
        banned_serials,
        seen,
        names: names.into_iter().collect(),
        db_info: None,
    };

    Ok(BuiltSnapshot {
        snapshot,
        missing_names,
    })
}

/// Snapshot served to the dashboard, shielded by the per-caller gate and the shared cache.
///
/// Missing display names are resolved in the background. Without a store the snapshot is
/// empty; when a rebuild fails the last good snapshot is served instead.
pub async fn admin_state(
    state: &SharedState,
    caller: &str,
) -> Result<Arc<AdminSnapshot>, ServiceError> {
    if let Some(cached) = state.snapshots().serve_cached(caller).await {
        return Ok(cached);
    }

    let Some(store) = state.tracker_store().await else {
        debug!("no storage installed; serving an empty snapshot");
        return Ok(Arc::new(AdminSnapshot::default()));
    };

    match build_snapshot(store.as_ref(), active_since(state, now_ms())).await {
        Ok(BuiltSnapshot {
            mut snapshot,
            missing_names,
        }) => {
            if !missing_names.is_empty() {
                state.names().schedule(store.clone(), missing_names);
            }
            snapshot.db_info = db_info(store.as_ref()).await;
            Ok(state.snapshots().store(caller, snapshot).await)
        }
        Err(err) => match state.snapshots().last_good().await {
            Some(previous) => {
                warn!(error = %err, "snapshot rebuild failed; serving last good copy");
                Ok(previous)
            }
            None => Err(err.into()),
        },
    }
}

async fn db_info(store: &dyn TrackerStore) -> Option<DbInfo> {
    match store.storage_usage().await {
        Ok(usage) => usage.map(DbInfo::from),
        Err(err) => {
            debug!(error = %err, "storage usage unavailable");
            None
        }
    }
}

/// Key presence records by address, most recently seen first.
fn by_recency(mut records: Vec<AddressEntity>) -> IndexMap<String, AddressView> {
    records.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.ip.cmp(&b.ip)));
    records
        .into_iter()
        .map(|record| {
            let view = AddressView::from(&record);
            (record.ip, view)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{AddressUpsert, GameEntity, GameFields, RejectedEntity, RejectedValue},
            tracker_store::memory::MemoryTrackerStore,
        },
        services::{catalog_service, name_lookup::NameLookup},
        state::AppState,
        test_support::UnavailableStore,
    };

    struct NoNames;

    impl NameLookup for NoNames {
        fn lookup_display_name(&self, _app_id: AppId) -> BoxFuture<'static, Option<String>> {
            Box::pin(async { None })
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            snapshot_ttl: Duration::from_secs(3600),
            admin_min_request_interval: Duration::ZERO,
            enrichment_spacing: Duration::ZERO,
            ..AppConfig::default()
        }
    }

    fn id(raw: &str) -> AppId {
        AppId::parse(raw).unwrap()
    }

    async fn seen(store: &MemoryTrackerStore, ip: &str, username: &str, serial: &str) {
        store
            .upsert_address(AddressUpsert {
                ip: ip.into(),
                seen_at: now_ms(),
                username: Some(username.into()),
                serial: Some(serial.into()),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn joins_bans_with_presence_and_lists_missing_names() {
        let store = MemoryTrackerStore::new();
        seen(&store, "1.2.3.4", "alice", "S1").await;
        store.ban_address("1.2.3.4".into()).await.unwrap();
        store.ban_address("8.8.8.8".into()).await.unwrap();
        store.ban_serial("S1".into()).await.unwrap();
        store
            .upsert_game(GameEntity {
                app_id: id("570"),
                fields: GameFields {
                    mode: 1,
                    created_at: 1,
                },
            })
            .await
            .unwrap();
        store.set_name(id("570"), "Dota 2".into()).await.unwrap();
        store
            .upsert_rejected(RejectedEntity {
                app_id: id("730"),
                value: RejectedValue::Flag(true),
            })
            .await
            .unwrap();

        let built = build_snapshot(&store, 0).await.unwrap();
        let snapshot = built.snapshot;

        let known = &snapshot.banned["1.2.3.4"];
        assert_eq!(known.serial.as_deref(), Some("S1"));
        assert_eq!(known.usernames.as_deref(), Some(&["alice".to_string()][..]));
        let unknown = &snapshot.banned["8.8.8.8"];
        assert!(unknown.serial.is_none() && unknown.usernames.is_none());

        assert_eq!(snapshot.banned_serials, vec!["S1"]);
        assert!(snapshot.active.contains_key("1.2.3.4"));
        assert_eq!(snapshot.names.get(&id("570")).map(String::as_str), Some("Dota 2"));
        assert_eq!(built.missing_names, vec![id("730")]);
    }

    #[tokio::test]
    async fn degraded_mode_serves_an_empty_snapshot() {
        let state = AppState::new(config(), Arc::new(NoNames));
        let snapshot = admin_state(&state, "10.0.0.1").await.unwrap();
        assert!(snapshot.seen.is_empty());
        assert!(snapshot.games.is_empty());
    }

    #[tokio::test]
    async fn cached_snapshot_is_refreshed_after_a_mutation() {
        let store = MemoryTrackerStore::new();
        let state = AppState::with_store(config(), Arc::new(NoNames), Arc::new(store.clone())).await;

        let first = admin_state(&state, "10.0.0.1").await.unwrap();
        assert!(first.games.is_empty());

        store.set_name(id("570"), "Dota 2".into()).await.unwrap();
        let cached = admin_state(&state, "10.0.0.2").await.unwrap();
        assert!(Arc::ptr_eq(&first, &cached));

        catalog_service::add_game(&state, id("570"), None).await.unwrap();
        let fresh = admin_state(&state, "10.0.0.1").await.unwrap();
        assert!(fresh.games.contains_key(&id("570")));
    }

    #[tokio::test]
    async fn failed_rebuild_falls_back_to_last_good_snapshot() {
        let store = MemoryTrackerStore::new();
        seen(&store, "1.2.3.4", "alice", "S1").await;
        let state = AppState::with_store(config(), Arc::new(NoNames), Arc::new(store)).await;
        let first = admin_state(&state, "10.0.0.1").await.unwrap();

        state.install_store(Arc::new(UnavailableStore)).await;
        state.snapshots().invalidate().await;
        let fallback = admin_state(&state, "10.0.0.1").await.unwrap();
        assert!(Arc::ptr_eq(&first, &fallback));
    }

    #[tokio::test]
    async fn failed_first_build_surfaces_the_error() {
        let state =
            AppState::with_store(config(), Arc::new(NoNames), Arc::new(UnavailableStore)).await;
        assert!(matches!(
            admin_state(&state, "10.0.0.1").await,
            Err(ServiceError::Unavailable(_))
        ));
    }
}
