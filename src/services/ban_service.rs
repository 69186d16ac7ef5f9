//! Address and serial bans, propagated to every address that shares a serial.

use std::{future::Future, sync::Arc};

use tracing::info;

use crate::{
    dao::{storage::StorageResult, tracker_store::TrackerStore},
    error::ServiceError,
    state::SharedState,
};

/// What a ban or unban touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanOutcome {
    /// Serial found on the target address, if any.
    pub serial: Option<String>,
    /// Addresses changed, the target first.
    pub addresses: Vec<String>,
}

/// Ban `ip`, its serial and every address sharing that serial.
pub async fn ban(state: &SharedState, ip: &str) -> Result<BanOutcome, ServiceError> {
    let ip = require(ip, "address")?;
    let store = state.require_tracker_store().await?;
    let outcome = invalidating(state, ban_address(&store, ip)).await?;
    info!(ip, serial = ?outcome.serial, affected = outcome.addresses.len(), "address banned");
    Ok(outcome)
}

/// Lift the ban on `ip`, its serial and every address sharing that serial.
pub async fn unban(state: &SharedState, ip: &str) -> Result<BanOutcome, ServiceError> {
    let ip = require(ip, "address")?;
    let store = state.require_tracker_store().await?;
    let outcome = invalidating(state, unban_address(&store, ip)).await?;
    info!(ip, serial = ?outcome.serial, affected = outcome.addresses.len(), "address unbanned");
    Ok(outcome)
}

/// Ban each address in order. Stops at the first failure; earlier bans stay applied.
pub async fn ban_many(state: &SharedState, ips: &[String]) -> Result<Vec<BanOutcome>, ServiceError> {
    let mut outcomes = Vec::with_capacity(ips.len());
    for ip in ips {
        outcomes.push(ban(state, ip).await?);
    }
    Ok(outcomes)
}

/// Ban `serial` and every address currently carrying it.
pub async fn ban_serial(state: &SharedState, serial: &str) -> Result<BanOutcome, ServiceError> {
    let serial = require(serial, "serial")?;
    let store = state.require_tracker_store().await?;
    let outcome = invalidating(state, ban_serial_holders(&store, serial)).await?;
    info!(serial, affected = outcome.addresses.len(), "serial banned");
    Ok(outcome)
}

/// Lift the ban on `serial` and on every address currently carrying it.
pub async fn unban_serial(state: &SharedState, serial: &str) -> Result<BanOutcome, ServiceError> {
    let serial = require(serial, "serial")?;
    let store = state.require_tracker_store().await?;
    let outcome = invalidating(state, unban_serial_holders(&store, serial)).await?;
    info!(serial, affected = outcome.addresses.len(), "serial unbanned");
    Ok(outcome)
}

async fn ban_address(store: &Arc<dyn TrackerStore>, ip: &str) -> StorageResult<BanOutcome> {
    store.ban_address(ip.to_owned()).await?;
    let mut outcome = BanOutcome {
        serial: None,
        addresses: vec![ip.to_owned()],
    };

    let Some(serial) = serial_of(store, ip).await? else {
        return Ok(outcome);
    };
    store.ban_serial(serial.clone()).await?;
    let siblings = addresses_with_serial(store, &serial, Some(ip)).await?;
    if !siblings.is_empty() {
        store.bulk_ban_addresses(siblings.clone()).await?;
    }

    outcome.serial = Some(serial);
    outcome.addresses.extend(siblings);
    Ok(outcome)
}

async fn unban_address(store: &Arc<dyn TrackerStore>, ip: &str) -> StorageResult<BanOutcome> {
    store.unban_address(ip.to_owned()).await?;
    let mut outcome = BanOutcome {
        serial: None,
        addresses: vec![ip.to_owned()],
    };

    let Some(serial) = serial_of(store, ip).await? else {
        return Ok(outcome);
    };
    store.unban_serial(serial.clone()).await?;
    let siblings = addresses_with_serial(store, &serial, Some(ip)).await?;
    if !siblings.is_empty() {
        store.bulk_unban_addresses(siblings.clone()).await?;
    }

    outcome.serial = Some(serial);
    outcome.addresses.extend(siblings);
    Ok(outcome)
}

async fn ban_serial_holders(store: &Arc<dyn TrackerStore>, serial: &str) -> StorageResult<BanOutcome> {
    store.ban_serial(serial.to_owned()).await?;
    let addresses = addresses_with_serial(store, serial, None).await?;
    if !addresses.is_empty() {
        store.bulk_ban_addresses(addresses.clone()).await?;
    }
    Ok(BanOutcome {
        serial: Some(serial.to_owned()),
        addresses,
    })
}

async fn unban_serial_holders(
    store: &Arc<dyn TrackerStore>,
    serial: &str,
) -> StorageResult<BanOutcome> {
    store.unban_serial(serial.to_owned()).await?;
    let addresses = addresses_with_serial(store, serial, None).await?;
    if !addresses.is_empty() {
        store.bulk_unban_addresses(addresses.clone()).await?;
    }
    Ok(BanOutcome {
        serial: Some(serial.to_owned()),
        addresses,
    })
}

async fn serial_of(store: &Arc<dyn TrackerStore>, ip: &str) -> StorageResult<Option<String>> {
    let record = store.find_address(ip.to_owned()).await?;
    Ok(record
        .and_then(|record| record.serial)
        .filter(|serial| !serial.is_empty()))
}

async fn addresses_with_serial(
    store: &Arc<dyn TrackerStore>,
    serial: &str,
    exclude: Option<&str>,
) -> StorageResult<Vec<String>> {
    let records = store.find_addresses_by_serial(serial.to_owned()).await?;
    Ok(records
        .into_iter()
        .map(|record| record.ip)
        .filter(|ip| Some(ip.as_str()) != exclude)
        .collect())
}

/// Run a ban mutation, then drop the cached ban sets and snapshot whether it succeeded or not.
async fn invalidating<T, F>(state: &SharedState, mutation: F) -> Result<T, ServiceError>
where
    F: Future<Output = StorageResult<T>>,
{
    let result = mutation.await;
    state.bans().invalidate().await;
    state.snapshots().invalidate().await;
    result.map_err(ServiceError::from)
}

fn require<'a>(value: &'a str, what: &str) -> Result<&'a str, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ServiceError::InvalidInput(format!("missing {what}")))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{AddressUpsert, now_ms},
            tracker_store::memory::MemoryTrackerStore,
        },
        services::name_lookup::SteamNameLookup,
        state::AppState,
    };

    async fn setup() -> (MemoryTrackerStore, SharedState) {
        let store = MemoryTrackerStore::new();
        let config = AppConfig {
            ban_cache_ttl: Duration::from_secs(3600),
            ..AppConfig::default()
        };
        let state = AppState::with_store(
            config,
            Arc::new(SteamNameLookup::new("http://127.0.0.1:9/appdetails")),
            Arc::new(store.clone()),
        )
        .await;
        (store, state)
    }

    async fn seen(store: &MemoryTrackerStore, ip: &str, serial: Option<&str>) {
        store
            .upsert_address(AddressUpsert {
                ip: ip.into(),
                seen_at: now_ms(),
                username: None,
                serial: serial.map(str::to_owned),
            })
            .await
            .unwrap();
    }

    async fn is_banned(state: &SharedState, store: &MemoryTrackerStore, ip: &str) -> bool {
        state.bans().is_banned(store, ip).await
    }

    #[tokio::test]
    async fn ban_propagates_through_the_shared_serial_and_unban_reverses_it() {
        let (store, state) = setup().await;
        seen(&store, "1.2.3.4", Some("S1")).await;
        seen(&store, "5.6.7.8", Some("S1")).await;
        seen(&store, "9.9.9.9", Some("S2")).await;

        // Prime the cache so the checks below prove it was invalidated.
        assert!(!is_banned(&state, &store, "5.6.7.8").await);

        let outcome = ban(&state, "1.2.3.4").await.unwrap();
        assert_eq!(outcome.serial.as_deref(), Some("S1"));
        assert_eq!(outcome.addresses, vec!["1.2.3.4", "5.6.7.8"]);
        assert!(is_banned(&state, &store, "1.2.3.4").await);
        assert!(is_banned(&state, &store, "5.6.7.8").await);
        assert!(state.bans().is_serial_banned(&store, "S1").await);
        assert!(!is_banned(&state, &store, "9.9.9.9").await);

        unban(&state, "1.2.3.4").await.unwrap();
        assert!(!is_banned(&state, &store, "1.2.3.4").await);
        assert!(!is_banned(&state, &store, "5.6.7.8").await);
        assert!(!state.bans().is_serial_banned(&store, "S1").await);
    }

    #[tokio::test]
    async fn address_without_serial_is_banned_alone() {
        let (store, state) = setup().await;
        let outcome = ban(&state, "1.2.3.4").await.unwrap();
        assert_eq!(outcome.serial, None);
        assert_eq!(store.list_banned_addresses().await.unwrap(), vec!["1.2.3.4"]);
        assert!(store.list_banned_serials().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ban_many_applies_each_target() {
        let (store, state) = setup().await;
        seen(&store, "5.6.7.8", Some("S1")).await;
        seen(&store, "7.7.7.7", Some("S1")).await;

        let ips = vec!["1.2.3.4".to_string(), "5.6.7.8".to_string()];
        let outcomes = ban_many(&state, &ips).await.unwrap();
        assert_eq!(outcomes.len(), 2);

        let mut banned = store.list_banned_addresses().await.unwrap();
        banned.sort();
        assert_eq!(banned, vec!["1.2.3.4", "5.6.7.8", "7.7.7.7"]);
    }

    #[tokio::test]
    async fn serial_ban_covers_current_holders() {
        let (store, state) = setup().await;
        seen(&store, "1.2.3.4", Some("S1")).await;
        seen(&store, "5.6.7.8", Some("S1")).await;

        ban_serial(&state, "S1").await.unwrap();
        assert!(is_banned(&state, &store, "1.2.3.4").await);
        assert!(is_banned(&state, &store, "5.6.7.8").await);

        unban_serial(&state, "S1").await.unwrap();
        assert!(!is_banned(&state, &store, "1.2.3.4").await);
        assert!(!state.bans().is_serial_banned(&store, "S1").await);
    }

    #[tokio::test]
    async fn blank_targets_are_rejected() {
        let (_store, state) = setup().await;
        assert!(matches!(
            ban(&state, " ").await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            ban_serial(&state, "").await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
