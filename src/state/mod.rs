pub mod ban_cache;
pub mod snapshot_cache;
pub mod write_throttle;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::tracker_store::TrackerStore,
    dto::snapshot::AdminSnapshot,
    error::ServiceError,
    services::{name_enrichment::NameEnricher, name_lookup::NameLookup},
};

pub use self::{ban_cache::BanCache, snapshot_cache::SnapshotCache, write_throttle::WriteThrottle};

pub type SharedState = Arc<AppState>;

/// Central application state: the storage handle plus the process-local caches in front of it.
pub struct AppState {
    config: AppConfig,
    tracker_store: RwLock<Option<Arc<dyn TrackerStore>>>,
    degraded: watch::Sender<bool>,
    bans: BanCache,
    throttle: WriteThrottle,
    snapshots: SnapshotCache<AdminSnapshot>,
    names: NameEnricher,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, lookup: Arc<dyn NameLookup>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            bans: BanCache::new(config.ban_cache_ttl),
            throttle: WriteThrottle::new(config.write_throttle),
            snapshots: SnapshotCache::new(config.snapshot_ttl, config.admin_min_request_interval),
            names: NameEnricher::new(lookup, config.enrichment_spacing),
            tracker_store: RwLock::new(None),
            degraded: degraded_tx,
            config,
        })
    }

    /// Construct a state with `store` already installed.
    pub async fn with_store(
        config: AppConfig,
        lookup: Arc<dyn NameLookup>,
        store: Arc<dyn TrackerStore>,
    ) -> SharedState {
        let state = Self::new(config, lookup);
        state.install_store(store).await;
        state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn bans(&self) -> &BanCache {
        &self.bans
    }

    pub fn throttle(&self) -> &WriteThrottle {
        &self.throttle
    }

    pub fn snapshots(&self) -> &SnapshotCache<AdminSnapshot> {
        &self.snapshots
    }

    pub fn names(&self) -> &NameEnricher {
        &self.names
    }

    /// Obtain a handle to the current tracker store, if one is installed.
    pub async fn tracker_store(&self) -> Option<Arc<dyn TrackerStore>> {
        let guard = self.tracker_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the tracker store or fail with [`ServiceError::Degraded`].
    pub async fn require_tracker_store(&self) -> Result<Arc<dyn TrackerStore>, ServiceError> {
        self.tracker_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new tracker store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn TrackerStore>) {
        {
            let mut guard = self.tracker_store.write().await;
            *guard = Some(store);
        }
        self.bans.invalidate().await;
        self.update_degraded(false);
    }

    /// Remove the current tracker store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.tracker_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::tracker_store::memory::MemoryTrackerStore, services::name_lookup::SteamNameLookup,
    };

    fn lookup() -> Arc<dyn NameLookup> {
        Arc::new(SteamNameLookup::new("http://127.0.0.1:9/appdetails"))
    }

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default(), lookup());
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_tracker_store().await,
            Err(ServiceError::Degraded)
        ));

        let mut watcher = state.degraded_watcher();
        state.install_store(Arc::new(MemoryTrackerStore::new())).await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_store().await;
        assert!(state.is_degraded());
        assert!(state.tracker_store().await.is_none());
    }
}
