use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::time::Instant;

use crate::dto::track::VisitStatus;

pub const DEFAULT_WRITE_THROTTLE: Duration = Duration::from_secs(60);
/// Online visits between two sweeps of expired entries.
const PRUNE_EVERY: u64 = 1024;

/// Per-address limiter deciding whether a presence update reaches storage.
///
/// Clients poll every ~15 s; only one write per address per window is persisted while
/// offline transitions always go through.
pub struct WriteThrottle {
    window: Duration,
    last_write: DashMap<String, Instant>,
    visits: AtomicU64,
}

impl WriteThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_write: DashMap::new(),
            visits: AtomicU64::new(0),
        }
    }

    /// Decide whether this visit must be persisted, recording the write when it is.
    pub fn should_persist(&self, ip: &str, status: VisitStatus) -> bool {
        if status == VisitStatus::Offline {
            return true;
        }

        let now = Instant::now();
        if self.visits.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune(now);
        }
        match self.last_write.entry(ip.to_owned()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.window {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Drop entries whose window has elapsed; clients that stop polling never go offline.
    fn prune(&self, now: Instant) {
        self.last_write
            .retain(|_, written| now.duration_since(*written) < self.window);
    }

    /// Forget the last write so the next online visit is persisted immediately.
    pub fn clear(&self, ip: &str) {
        self.last_write.remove(ip);
    }
}

impl Default for WriteThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_WRITE_THROTTLE)
    }
}
