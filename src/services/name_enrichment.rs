//! Detached background task filling the display-name cache.

use std::{sync::Arc, time::Duration};

use dashmap::DashSet;
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, warn};

use crate::{
    dao::{models::AppId, tracker_store::TrackerStore},
    services::name_lookup::NameLookup,
};

pub const DEFAULT_ENRICHMENT_SPACING: Duration = Duration::from_millis(500);

/// Deduplicating dispatcher for name lookups.
///
/// An id stays in the in-flight set from the moment it is scheduled until its own lookup
/// finishes, whatever the outcome. Ids already in flight are skipped.
pub struct NameEnricher {
    lookup: Arc<dyn NameLookup>,
    spacing: Duration,
    in_flight: Arc<DashSet<AppId>>,
}

impl NameEnricher {
    pub fn new(lookup: Arc<dyn NameLookup>, spacing: Duration) -> Self {
        Self {
            lookup,
            spacing,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_in_flight(&self, app_id: &AppId) -> bool {
        self.in_flight.contains(app_id)
    }

    /// Spawn one task resolving every id of `missing` not already in flight, one after the
    /// other. Returns `None` when there is nothing new to fetch.
    pub fn schedule(
        &self,
        store: Arc<dyn TrackerStore>,
        missing: Vec<AppId>,
    ) -> Option<JoinHandle<()>> {
        let batch: Vec<AppId> = missing
            .into_iter()
            .filter(|id| self.in_flight.insert(id.clone()))
            .collect();
        if batch.is_empty() {
            return None;
        }

        debug!(count = batch.len(), "scheduling display-name enrichment");
        let lookup = self.lookup.clone();
        let in_flight = self.in_flight.clone();
        let spacing = self.spacing;

        Some(tokio::spawn(async move {
            for app_id in batch {
                sleep(spacing).await;
                if let Some(name) = lookup.lookup_display_name(app_id.clone()).await {
                    if let Err(err) = store.set_name(app_id.clone(), name).await {
                        warn!(app_id = %app_id, error = %err, "failed to store display name");
                    }
                }
                in_flight.remove(&app_id);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use futures::future::BoxFuture;

    use super::*;
    use crate::dao::tracker_store::memory::MemoryTrackerStore;

    struct FixedLookup(HashMap<String, String>);

    impl NameLookup for FixedLookup {
        fn lookup_display_name(&self, app_id: AppId) -> BoxFuture<'static, Option<String>> {
            let name = self.0.get(app_id.as_str()).cloned();
            Box::pin(async move { name })
        }
    }

    fn id(raw: &str) -> AppId {
        AppId::parse(raw).unwrap()
    }

    fn enricher() -> NameEnricher {
        let names = HashMap::from([("570".to_string(), "Dota 2".to_string())]);
        NameEnricher::new(Arc::new(FixedLookup(names)), Duration::ZERO)
    }

    #[tokio::test]
    async fn resolved_names_are_stored_and_failures_skipped() {
        let store = MemoryTrackerStore::new();
        let enricher = enricher();

        let handle = enricher
            .schedule(Arc::new(store.clone()), vec![id("570"), id("999")])
            .expect("new ids are scheduled");
        handle.await.unwrap();

        assert_eq!(store.get_name(id("570")).await.unwrap().as_deref(), Some("Dota 2"));
        assert!(store.get_name(id("999")).await.unwrap().is_none());
        assert!(!enricher.is_in_flight(&id("570")));
        assert!(!enricher.is_in_flight(&id("999")));
    }

    #[tokio::test]
    async fn ids_in_flight_are_not_fetched_twice() {
        let store = Arc::new(MemoryTrackerStore::new());
        let enricher = NameEnricher::new(
            Arc::new(FixedLookup(HashMap::new())),
            Duration::from_secs(3600),
        );

        let first = enricher.schedule(store.clone(), vec![id("570")]);
        assert!(first.is_some());
        assert!(enricher.is_in_flight(&id("570")));
        assert!(enricher.schedule(store, vec![id("570")]).is_none());

        if let Some(handle) = first {
            handle.abort();
        }
    }
}
