//! Process-local [`TrackerStore`] used when no document store is configured and by tests.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::dao::{
    models::{
        AddressEntity, AddressUpsert, AppId, GameEntity, NameEntity, RejectedEntity,
        StorageUsage, TimestampMs,
    },
    storage::StorageResult,
    tracker_store::TrackerStore,
};

#[derive(Clone, Default)]
pub struct MemoryTrackerStore {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    addresses: HashMap<String, AddressEntity>,
    banned_addresses: BTreeSet<String>,
    banned_serials: BTreeSet<String>,
    games: HashMap<AppId, GameEntity>,
    rejected: HashMap<AppId, RejectedEntity>,
    names: HashMap<AppId, String>,
}

impl MemoryTrackerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T, F>(&self, f: F) -> BoxFuture<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&MemoryState) -> T + Send + 'static,
    {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            Ok(f(&guard))
        })
    }

    fn write<F>(&self, f: F) -> BoxFuture<'static, StorageResult<()>>
    where
        F: FnOnce(&mut MemoryState) + Send + 'static,
    {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.write().await;
            f(&mut guard);
            Ok(())
        })
    }
}

impl TrackerStore for MemoryTrackerStore {
    fn find_active_addresses(
        &self,
        since: TimestampMs,
    ) -> BoxFuture<'static, StorageResult<Vec<AddressEntity>>> {
        self.read(move |state| {
            state
                .addresses
                .values()
                .filter(|record| record.last_seen > since)
                .cloned()
                .collect()
        })
    }

    fn count_active_addresses(&self, since: TimestampMs) -> BoxFuture<'static, StorageResult<u64>> {
        self.read(move |state| {
            state
                .addresses
                .values()
                .filter(|record| record.last_seen > since)
                .count() as u64
        })
    }

    fn list_addresses(&self) -> BoxFuture<'static, StorageResult<Vec<AddressEntity>>> {
        self.read(|state| state.addresses.values().cloned().collect())
    }

    fn upsert_address(&self, upsert: AddressUpsert) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| {
            let record = state
                .addresses
                .entry(upsert.ip.clone())
                .or_insert_with(|| AddressEntity {
                    ip: upsert.ip,
                    first_seen: upsert.seen_at,
                    last_seen: upsert.seen_at,
                    usernames: BTreeSet::new(),
                    serial: None,
                });
            record.last_seen = upsert.seen_at;
            if let Some(username) = upsert.username {
                record.usernames.insert(username);
            }
            if let Some(serial) = upsert.serial {
                record.serial = Some(serial);
            }
        })
    }

    fn delete_address(&self, ip: String) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| {
            state.addresses.remove(&ip);
        })
    }

    fn find_address(&self, ip: String) -> BoxFuture<'static, StorageResult<Option<AddressEntity>>> {
        self.read(move |state| state.addresses.get(&ip).cloned())
    }

    fn find_addresses_by_serial(
        &self,
        serial: String,
    ) -> BoxFuture<'static, StorageResult<Vec<AddressEntity>>> {
        self.read(move |state| {
            state
                .addresses
                .values()
                .filter(|record| record.serial.as_deref() == Some(serial.as_str()))
                .cloned()
                .collect()
        })
    }

    fn list_banned_addresses(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        self.read(|state| state.banned_addresses.iter().cloned().collect())
    }

    fn ban_address(&self, ip: String) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| {
            state.banned_addresses.insert(ip);
        })
    }

    fn unban_address(&self, ip: String) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| {
            state.banned_addresses.remove(&ip);
        })
    }

    fn bulk_ban_addresses(&self, ips: Vec<String>) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| state.banned_addresses.extend(ips))
    }

    fn bulk_unban_addresses(&self, ips: Vec<String>) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| {
            for ip in &ips {
                state.banned_addresses.remove(ip);
            }
        })
    }

    fn list_banned_serials(&self) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        self.read(|state| state.banned_serials.iter().cloned().collect())
    }

    fn ban_serial(&self, serial: String) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| {
            state.banned_serials.insert(serial);
        })
    }

    fn unban_serial(&self, serial: String) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| {
            state.banned_serials.remove(&serial);
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        self.read(|state| state.games.values().cloned().collect())
    }

    fn find_game(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        self.read(move |state| state.games.get(&app_id).cloned())
    }

    fn upsert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| {
            state.games.insert(game.app_id.clone(), game);
        })
    }

    fn delete_games(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| {
            state.games.remove(&app_id);
        })
    }

    fn list_rejected(&self) -> BoxFuture<'static, StorageResult<Vec<RejectedEntity>>> {
        self.read(|state| state.rejected.values().cloned().collect())
    }

    fn find_rejected(
        &self,
        app_id: AppId,
    ) -> BoxFuture<'static, StorageResult<Option<RejectedEntity>>> {
        self.read(move |state| state.rejected.get(&app_id).cloned())
    }

    fn upsert_rejected(&self, entry: RejectedEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| {
            state.rejected.insert(entry.app_id.clone(), entry);
        })
    }

    fn delete_rejected(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| {
            state.rejected.remove(&app_id);
        })
    }

    fn list_names(&self) -> BoxFuture<'static, StorageResult<Vec<NameEntity>>> {
        self.read(|state| {
            state
                .names
                .iter()
                .map(|(app_id, name)| NameEntity {
                    app_id: app_id.clone(),
                    name: name.clone(),
                })
                .collect()
        })
    }

    fn get_name(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<Option<String>>> {
        self.read(move |state| state.names.get(&app_id).cloned())
    }

    fn set_name(&self, app_id: AppId, name: String) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| {
            state.names.insert(app_id, name);
        })
    }

    fn delete_names(&self, app_id: AppId) -> BoxFuture<'static, StorageResult<()>> {
        self.write(move |state| {
            state.names.remove(&app_id);
        })
    }

    fn storage_usage(&self) -> BoxFuture<'static, StorageResult<Option<StorageUsage>>> {
        Box::pin(async { Ok(None) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
