//! Display-name resolution against the Steam store API.

use std::{collections::HashMap, time::Duration};

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use crate::dao::models::AppId;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of human-readable application names.
///
/// Lookups fail open: any transport error or unexpected payload yields `None`.
pub trait NameLookup: Send + Sync {
    fn lookup_display_name(&self, app_id: AppId) -> BoxFuture<'static, Option<String>>;
}

/// [`NameLookup`] backed by the `appdetails` endpoint of the Steam store.
#[derive(Clone)]
pub struct SteamNameLookup {
    client: reqwest::Client,
    endpoint: String,
}

impl SteamNameLookup {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AppDetails {
    #[serde(default)]
    success: bool,
    data: Option<AppData>,
}

#[derive(Debug, Deserialize)]
struct AppData {
    name: Option<String>,
}

/// Extract the name of `app_id` from an `appdetails` response body.
fn name_from_details(app_id: &AppId, body: HashMap<String, AppDetails>) -> Option<String> {
    let details = body.get(app_id.as_str())?;
    if !details.success {
        return None;
    }
    details
        .data
        .as_ref()?
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
}

impl NameLookup for SteamNameLookup {
    fn lookup_display_name(&self, app_id: AppId) -> BoxFuture<'static, Option<String>> {
        let this = self.clone();
        Box::pin(async move {
            let response = this
                .client
                .get(&this.endpoint)
                .query(&[("appids", app_id.as_str()), ("filters", "basic")])
                .send()
                .await
                .and_then(|response| response.error_for_status());
            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    debug!(app_id = %app_id, error = %err, "name lookup request failed");
                    return None;
                }
            };

            match response.json::<HashMap<String, AppDetails>>().await {
                Ok(body) => name_from_details(&app_id, body),
                Err(err) => {
                    debug!(app_id = %app_id, error = %err, "name lookup returned an unexpected payload");
                    None
                }
            }
        })
    }
}
