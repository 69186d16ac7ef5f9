//! Process-local mirror of the persisted ban sets.

use std::{collections::HashSet, time::Duration};

use tokio::{sync::RwLock, time::Instant};
use tracing::{debug, warn};

use crate::dao::{storage::StorageResult, tracker_store::TrackerStore};

pub const DEFAULT_BAN_CACHE_TTL: Duration = Duration::from_secs(30);

/// Lazily refreshed copy of the banned addresses and serials.
///
/// Both sets share a single refresh timestamp and are always reloaded together. The copy is
/// advisory: lookups that cannot reach the store answer "not banned".
pub struct BanCache {
    ttl: Duration,
    inner: RwLock<BanCacheInner>,
}

#[derive(Default)]
struct BanCacheInner {
    sets: Option<BanSets>,
    /// Bumped on every invalidation so a refresh started earlier does not install stale sets.
    generation: u64,
}

struct BanSets {
    addresses: HashSet<String>,
    serials: HashSet<String>,
    loaded_at: Instant,
}

enum Lookup<'a> {
    Address(&'a str),
    Serial(&'a str),
}

impl BanSets {
    fn contains(&self, lookup: &Lookup<'_>) -> bool {
        match lookup {
            Lookup::Address(ip) => self.addresses.contains(*ip),
            Lookup::Serial(serial) => self.serials.contains(*serial),
        }
    }
}

impl BanCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(BanCacheInner::default()),
        }
    }

    /// Whether `ip` is in the banned address set.
    pub async fn is_banned(&self, store: &dyn TrackerStore, ip: &str) -> bool {
        self.lookup(store, Lookup::Address(ip)).await
    }

    /// Whether `serial` is in the banned serial set. Shares the refresh with [`Self::is_banned`].
    pub async fn is_serial_banned(&self, store: &dyn TrackerStore, serial: &str) -> bool {
        self.lookup(store, Lookup::Serial(serial)).await
    }

    /// Drop both sets so the next lookup reloads them from storage.
    pub async fn invalidate(&self) {
        let mut guard = self.inner.write().await;
        guard.sets = None;
        guard.generation = guard.generation.wrapping_add(1);
    }

    async fn lookup(&self, store: &dyn TrackerStore, lookup: Lookup<'_>) -> bool {
        let generation = {
            let guard = self.inner.read().await;
            match &guard.sets {
                Some(sets) if sets.loaded_at.elapsed() <= self.ttl => {
                    return sets.contains(&lookup);
                }
                _ => guard.generation,
            }
        };

        let sets = match load_sets(store).await {
            Ok(sets) => sets,
            Err(err) => {
                warn!(error = %err, "ban list refresh failed; treating lookup as not banned");
                return false;
            }
        };
        let banned = sets.contains(&lookup);

        let mut guard = self.inner.write().await;
        if guard.generation == generation {
            debug!(
                addresses = sets.addresses.len(),
                serials = sets.serials.len(),
                "ban cache refreshed"
            );
            guard.sets = Some(sets);
        }

        banned
    }
}

impl Default for BanCache {
    fn default() -> Self {
        Self::new(DEFAULT_BAN_CACHE_TTL)
    }
}

async fn load_sets(store: &dyn TrackerStore) -> StorageResult<BanSets> {
    let (addresses, serials) =
        futures::try_join!(store.list_banned_addresses(), store.list_banned_serials())?;
    Ok(BanSets {
        addresses: addresses.into_iter().collect(),
        serials: serials.into_iter().collect(),
        loaded_at: Instant::now(),
    })
}
