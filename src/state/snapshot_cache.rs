use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{sync::RwLock, time::Instant};

pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(1_000);

/// Shields an expensive read behind a shared response cache and a per-caller interval gate.
pub struct SnapshotCache<T> {
    ttl: Duration,
    min_interval: Duration,
    last_request: DashMap<String, Instant>,
    cached: RwLock<Option<Cached<T>>>,
}

struct Cached<T> {
    data: Arc<T>,
    /// `None` once invalidated; the data is then only served as a failure fallback.
    computed_at: Option<Instant>,
}

impl<T> SnapshotCache<T> {
    pub fn new(ttl: Duration, min_interval: Duration) -> Self {
        Self {
            ttl,
            min_interval,
            last_request: DashMap::new(),
            cached: RwLock::new(None),
        }
    }

    /// Return the cached value when `caller` asked too recently or the shared copy is fresh.
    pub async fn serve_cached(&self, caller: &str) -> Option<Arc<T>> {
        let (data, computed_at) = {
            let guard = self.cached.read().await;
            let cached = guard.as_ref()?;
            (cached.data.clone(), cached.computed_at?)
        };
        let now = Instant::now();

        let throttled = self
            .last_request
            .get(caller)
            .is_some_and(|last| now.duration_since(*last) < self.min_interval);
        if throttled {
            return Some(data);
        }

        if now.duration_since(computed_at) < self.ttl {
            self.last_request.insert(caller.to_owned(), now);
            return Some(data);
        }

        None
    }

    /// Install a freshly computed value and record the caller's request time.
    pub async fn store(&self, caller: &str, data: T) -> Arc<T> {
        let data = Arc::new(data);
        let now = Instant::now();
        {
            let mut guard = self.cached.write().await;
            *guard = Some(Cached {
                data: data.clone(),
                computed_at: Some(now),
            });
        }
        self.last_request.insert(caller.to_owned(), now);
        data
    }

    /// Most recent value regardless of freshness.
    pub async fn last_good(&self) -> Option<Arc<T>> {
        let guard = self.cached.read().await;
        guard.as_ref().map(|cached| cached.data.clone())
    }

    /// Force the next request to recompute; the old value stays available as a fallback.
    pub async fn invalidate(&self) {
        let mut guard = self.cached.write().await;
        if let Some(cached) = guard.as_mut() {
            cached.computed_at = None;
        }
    }
}

impl<T> Default for SnapshotCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_TTL, DEFAULT_MIN_REQUEST_INTERVAL)
    }
}
