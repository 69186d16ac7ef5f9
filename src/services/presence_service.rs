//! Visit recording: ban gate, throttled presence writes and the live active count.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    dao::{
        models::{AddressUpsert, TimestampMs, now_ms},
        tracker_store::TrackerStore,
    },
    dto::track::{TrackExtra, TrackRequest, TrackResponse, VisitStatus},
    error::ServiceError,
    services::catalog_service,
    state::SharedState,
};

/// A single presence report.
#[derive(Debug, Clone)]
pub struct Visit {
    pub ip: String,
    pub username: Option<String>,
    pub serial: Option<String>,
    pub status: VisitStatus,
}

/// Result of [`record_visit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitOutcome {
    /// `None` when the visitor is banned.
    pub active_count: Option<u64>,
    pub banned: bool,
}

impl VisitOutcome {
    fn banned() -> Self {
        Self {
            active_count: None,
            banned: true,
        }
    }
}

/// Record a visit and report how many addresses are currently active.
///
/// Banned visitors get `banned: true` and nothing is written. Otherwise the write throttle
/// decides whether the presence record is touched, and the active count is always read live.
pub async fn record_visit(state: &SharedState, visit: Visit) -> Result<VisitOutcome, ServiceError> {
    let ip = visit.ip.trim();
    if ip.is_empty() {
        return Err(ServiceError::InvalidInput("missing client address".into()));
    }
    let store = state.require_tracker_store().await?;

    if is_visitor_banned(state, store.as_ref(), ip, visit.serial.as_deref()).await {
        debug!(ip, "visit from banned client ignored");
        return Ok(VisitOutcome::banned());
    }

    if state.throttle().should_persist(ip, visit.status) {
        persist(state, &store, ip, &visit).await?;
    }

    let since = active_since(state, now_ms());
    let active_count = store.count_active_addresses(since).await?;
    Ok(VisitOutcome {
        active_count: Some(active_count),
        banned: false,
    })
}

/// Handle a client report from `ip`: record the visit and describe the reported application.
pub async fn track(
    state: &SharedState,
    ip: String,
    request: TrackRequest,
) -> Result<TrackResponse, ServiceError> {
    let visit = Visit {
        ip: ip.clone(),
        username: request.username(),
        serial: request
            .serial
            .as_deref()
            .map(str::trim)
            .filter(|serial| !serial.is_empty())
            .map(str::to_owned),
        status: request.status,
    };
    let outcome = record_visit(state, visit).await?;

    let mut extra = TrackExtra::default();
    if let (false, Some(app_id)) = (outcome.banned, request.app_id) {
        let (status, game) = catalog_service::game_status(state, app_id).await?;
        extra.game_status = Some(status);
        extra.game = game;
    }

    Ok(TrackResponse {
        ok: true,
        ip,
        active_count: outcome.active_count,
        active: outcome.active_count,
        banned: outcome.banned,
        extra,
    })
}

async fn is_visitor_banned(
    state: &SharedState,
    store: &dyn TrackerStore,
    ip: &str,
    serial: Option<&str>,
) -> bool {
    if state.bans().is_banned(store, ip).await {
        return true;
    }
    match serial {
        Some(serial) => state.bans().is_serial_banned(store, serial).await,
        None => false,
    }
}

async fn persist(
    state: &SharedState,
    store: &Arc<dyn TrackerStore>,
    ip: &str,
    visit: &Visit,
) -> Result<(), ServiceError> {
    if visit.status == VisitStatus::Offline {
        store.delete_address(ip.to_owned()).await?;
        state.throttle().clear(ip);
        return Ok(());
    }

    let upsert = AddressUpsert {
        ip: ip.to_owned(),
        seen_at: now_ms(),
        username: visit.username.clone(),
        serial: visit.serial.clone(),
    };
    if let Err(err) = store.upsert_address(upsert).await {
        warn!(ip, error = %err, "failed to persist visit");
        state.throttle().clear(ip);
        return Err(err.into());
    }
    Ok(())
}

/// Oldest `lastSeen` still counted as active at `now`.
pub fn active_since(state: &SharedState, now: TimestampMs) -> TimestampMs {
    let window = i64::try_from(state.config().active_window.as_millis()).unwrap_or(i64::MAX);
    now.saturating_sub(window)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::tracker_store::memory::MemoryTrackerStore,
        dto::track::GameStatus,
        services::name_lookup::{NameLookup, SteamNameLookup},
        state::AppState,
    };

    fn lookup() -> Arc<dyn NameLookup> {
        Arc::new(SteamNameLookup::new("http://127.0.0.1:9/appdetails"))
    }

    async fn state_with(store: &MemoryTrackerStore, config: AppConfig) -> SharedState {
        AppState::with_store(config, lookup(), Arc::new(store.clone())).await
    }

    fn visit(ip: &str, status: VisitStatus) -> Visit {
        Visit {
            ip: ip.into(),
            username: Some("player".into()),
            serial: None,
            status,
        }
    }

    #[tokio::test]
    async fn missing_address_is_invalid_input() {
        let store = MemoryTrackerStore::new();
        let state = state_with(&store, AppConfig::default()).await;
        let err = record_visit(&state, visit("  ", VisitStatus::Online))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn degraded_mode_is_reported() {
        let state = AppState::new(AppConfig::default(), lookup());
        let err = record_visit(&state, visit("1.2.3.4", VisitStatus::Online))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }

    #[tokio::test]
    async fn offline_visit_removes_the_address_from_the_active_set() {
        let store = MemoryTrackerStore::new();
        let state = state_with(&store, AppConfig::default()).await;

        let outcome = record_visit(&state, visit("1.2.3.4", VisitStatus::Online))
            .await
            .unwrap();
        assert_eq!(outcome.active_count, Some(1));

        let outcome = record_visit(&state, visit("1.2.3.4", VisitStatus::Offline))
            .await
            .unwrap();
        assert_eq!(outcome.active_count, Some(0));
        assert!(store.find_address("1.2.3.4".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn throttled_visit_skips_the_write_but_counts_live() {
        let store = MemoryTrackerStore::new();
        let state = state_with(&store, AppConfig::default()).await;

        record_visit(&state, visit("1.2.3.4", VisitStatus::Online))
            .await
            .unwrap();

        let mut second = visit("1.2.3.4", VisitStatus::Online);
        second.username = Some("renamed".into());
        store
            .upsert_address(AddressUpsert {
                ip: "5.6.7.8".into(),
                seen_at: now_ms(),
                username: None,
                serial: None,
            })
            .await
            .unwrap();

        let outcome = record_visit(&state, second).await.unwrap();
        assert_eq!(outcome.active_count, Some(2));
        let record = store.find_address("1.2.3.4".into()).await.unwrap().unwrap();
        assert!(!record.usernames.contains("renamed"));
    }

    #[tokio::test]
    async fn offline_clears_the_throttle_for_the_next_login() {
        let store = MemoryTrackerStore::new();
        let state = state_with(&store, AppConfig::default()).await;

        record_visit(&state, visit("1.2.3.4", VisitStatus::Online))
            .await
            .unwrap();
        record_visit(&state, visit("1.2.3.4", VisitStatus::Offline))
            .await
            .unwrap();
        let outcome = record_visit(&state, visit("1.2.3.4", VisitStatus::Online))
            .await
            .unwrap();

        assert_eq!(outcome.active_count, Some(1));
        assert!(store.find_address("1.2.3.4".into()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn banned_serial_blocks_the_visit_without_writing() {
        let store = MemoryTrackerStore::new();
        store.ban_serial("S1".into()).await.unwrap();
        let state = state_with(
            &store,
            AppConfig {
                ban_cache_ttl: Duration::from_secs(3600),
                ..AppConfig::default()
            },
        )
        .await;

        let mut report = visit("9.9.9.9", VisitStatus::Online);
        report.serial = Some("S1".into());
        let outcome = record_visit(&state, report).await.unwrap();

        assert_eq!(outcome, VisitOutcome::banned());
        assert!(store.list_addresses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn banned_address_keeps_its_record_untouched() {
        let store = MemoryTrackerStore::new();
        store
            .upsert_address(AddressUpsert {
                ip: "1.2.3.4".into(),
                seen_at: 1_000,
                username: Some("alice".into()),
                serial: None,
            })
            .await
            .unwrap();
        store.ban_address("1.2.3.4".into()).await.unwrap();
        let state = state_with(&store, AppConfig::default()).await;

        let mut report = visit("1.2.3.4", VisitStatus::Online);
        report.username = Some("mallory".into());
        let outcome = record_visit(&state, report).await.unwrap();

        assert_eq!(outcome, VisitOutcome::banned());
        let record = store.find_address("1.2.3.4".into()).await.unwrap().unwrap();
        assert_eq!(record.last_seen, 1_000);
        assert_eq!(record.usernames.iter().collect::<Vec<_>>(), vec!["alice"]);
    }

    #[tokio::test]
    async fn offline_report_with_blank_serial_removes_the_record() {
        let store = MemoryTrackerStore::new();
        let state = state_with(&store, AppConfig::default()).await;
        record_visit(&state, visit("1.2.3.4", VisitStatus::Online))
            .await
            .unwrap();

        let request: TrackRequest =
            serde_json::from_value(serde_json::json!({"status": "offline", "serial": ""}))
                .unwrap();
        let response = track(&state, "1.2.3.4".into(), request).await.unwrap();

        assert_eq!(response.active_count, Some(0));
        assert!(store.find_address("1.2.3.4".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn track_reports_the_game_status_of_unbanned_clients() {
        let store = MemoryTrackerStore::new();
        let state = state_with(&store, AppConfig::default()).await;
        let request: TrackRequest = serde_json::from_value(serde_json::json!({
            "discord": "player#1",
            "serial": "S1",
            "appId": 570
        }))
        .unwrap();

        let response = track(&state, "1.2.3.4".into(), request).await.unwrap();
        assert_eq!(response.active_count, Some(1));
        assert_eq!(response.active, Some(1));
        assert_eq!(response.extra.game_status, Some(GameStatus::Unknown));

        let record = store.find_address("1.2.3.4".into()).await.unwrap().unwrap();
        assert!(record.usernames.contains("player#1"));
        assert_eq!(record.serial.as_deref(), Some("S1"));
    }
}
