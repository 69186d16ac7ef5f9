//! Application-level configuration loading: optional JSON file, then environment overrides.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    services::name_enrichment::DEFAULT_ENRICHMENT_SPACING,
    state::{
        ban_cache::DEFAULT_BAN_CACHE_TTL,
        snapshot_cache::{DEFAULT_MIN_REQUEST_INTERVAL, DEFAULT_SNAPSHOT_TTL},
        write_throttle::DEFAULT_WRITE_THROTTLE,
    },
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRACKER_CONFIG_PATH";
const DEFAULT_ADMIN_PASS: &str = "admin123";
const DEFAULT_NAME_LOOKUP_URL: &str = "https://store.steampowered.com/api/appdetails";
const DEFAULT_ACTIVE_WINDOW: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub port: u16,
    /// When unset the service keeps its state in process memory.
    pub mongo_uri: Option<String>,
    pub mongo_db: Option<String>,
    pub admin_pass: String,
    pub ban_cache_ttl: Duration,
    pub write_throttle: Duration,
    /// Visits newer than this count towards the active total.
    pub active_window: Duration,
    pub snapshot_ttl: Duration,
    pub admin_min_request_interval: Duration,
    /// Pause between two display-name lookups of the same enrichment batch.
    pub enrichment_spacing: Duration,
    pub name_lookup_url: String,
}

impl AppConfig {
    /// Load the configuration file (if any) and apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::from_file();
        config.apply_overrides(|key| env::var(key).ok());
        if config.admin_pass == DEFAULT_ADMIN_PASS {
            warn!("ADMIN_PASS not set; admin routes accept the built-in default password");
        }
        config
    }

    fn from_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Apply the supported environment variables on top of the current values.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(port) = non_empty("PORT")
            .or_else(|| non_empty("SERVER_PORT"))
            .and_then(|value| value.parse::<u16>().ok())
        {
            self.port = port;
        }
        if let Some(uri) = non_empty("MONGO_URI") {
            self.mongo_uri = Some(uri);
        }
        if let Some(db) = non_empty("MONGO_DB") {
            self.mongo_db = Some(db);
        }
        if let Some(pass) = non_empty("ADMIN_PASS") {
            self.admin_pass = pass;
        }
        if let Some(secs) = non_empty("ADMIN_STATE_CACHE_SEC").and_then(|v| v.parse::<u64>().ok()) {
            self.snapshot_ttl = Duration::from_secs(secs);
        }
        if let Some(ms) =
            non_empty("ADMIN_MIN_REQUEST_INTERVAL_MS").and_then(|v| v.parse::<u64>().ok())
        {
            self.admin_min_request_interval = Duration::from_millis(ms);
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            mongo_uri: None,
            mongo_db: None,
            admin_pass: DEFAULT_ADMIN_PASS.into(),
            ban_cache_ttl: DEFAULT_BAN_CACHE_TTL,
            write_throttle: DEFAULT_WRITE_THROTTLE,
            active_window: DEFAULT_ACTIVE_WINDOW,
            snapshot_ttl: DEFAULT_SNAPSHOT_TTL,
            admin_min_request_interval: DEFAULT_MIN_REQUEST_INTERVAL,
            enrichment_spacing: DEFAULT_ENRICHMENT_SPACING,
            name_lookup_url: DEFAULT_NAME_LOOKUP_URL.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    port: Option<u16>,
    mongo_uri: Option<String>,
    mongo_db: Option<String>,
    admin_pass: Option<String>,
    ban_cache_ttl_ms: Option<u64>,
    write_throttle_ms: Option<u64>,
    active_window_secs: Option<u64>,
    snapshot_ttl_secs: Option<u64>,
    admin_min_request_interval_ms: Option<u64>,
    enrichment_spacing_ms: Option<u64>,
    name_lookup_url: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            port: raw.port.unwrap_or(defaults.port),
            mongo_uri: raw.mongo_uri.or(defaults.mongo_uri),
            mongo_db: raw.mongo_db.or(defaults.mongo_db),
            admin_pass: raw.admin_pass.unwrap_or(defaults.admin_pass),
            ban_cache_ttl: raw
                .ban_cache_ttl_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.ban_cache_ttl),
            write_throttle: raw
                .write_throttle_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.write_throttle),
            active_window: raw
                .active_window_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.active_window),
            snapshot_ttl: raw
                .snapshot_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.snapshot_ttl),
            admin_min_request_interval: raw
                .admin_min_request_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.admin_min_request_interval),
            enrichment_spacing: raw
                .enrichment_spacing_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.enrichment_spacing),
            name_lookup_url: raw.name_lookup_url.unwrap_or(defaults.name_lookup_url),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
