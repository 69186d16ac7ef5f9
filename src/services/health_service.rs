use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report `ok` only when a store is installed and answers its ping.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Some(store) = state.tracker_store().await else {
        warn!("storage unavailable (degraded mode)");
        return HealthResponse::degraded();
    };

    match store.health_check().await {
        Ok(()) if !state.is_degraded() => HealthResponse::ok(),
        Ok(()) => HealthResponse::degraded(),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded()
        }
    }
}
