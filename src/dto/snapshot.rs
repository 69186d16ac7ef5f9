//! Aggregate dashboard view assembled from every persisted collection.

use indexmap::IndexMap;
use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

use crate::dao::models::{
    AddressEntity, AppId, GameFields, RejectedValue, StorageUsage, TimestampMs,
};

/// Presence record as shown on the dashboard.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressView {
    pub first_seen: TimestampMs,
    pub last_seen: TimestampMs,
    pub usernames: Vec<String>,
    pub serial: Option<String>,
}

impl From<&AddressEntity> for AddressView {
    fn from(value: &AddressEntity) -> Self {
        Self {
            first_seen: value.first_seen,
            last_seen: value.last_seen,
            usernames: value.usernames.iter().cloned().collect(),
            serial: value.serial.clone(),
        }
    }
}

/// Banned address joined with whatever presence data still exists for it.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct BannedAddressView {
    pub serial: Option<String>,
    pub usernames: Option<Vec<String>>,
}

/// Storage consumption reported by the backend.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DbInfo {
    pub used_storage: u64,
    pub max_storage: u64,
    pub used_storage_human: String,
    pub max_storage_human: String,
}

impl From<StorageUsage> for DbInfo {
    fn from(value: StorageUsage) -> Self {
        Self {
            used_storage: value.used,
            max_storage: value.max,
            used_storage_human: format_bytes(value.used),
            max_storage_human: format!("{} (Allocated)", format_bytes(value.max)),
        }
    }
}

/// Full administrative snapshot.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminSnapshot {
    /// Addresses seen within the active window.
    #[schema(value_type = Object)]
    pub active: IndexMap<String, AddressView>,
    #[schema(value_type = Object)]
    pub games: IndexMap<AppId, GameFields>,
    #[schema(value_type = Object)]
    pub rejected: IndexMap<AppId, RejectedValue>,
    #[schema(value_type = Object)]
    pub banned: IndexMap<String, BannedAddressView>,
    pub banned_serials: Vec<String>,
    /// Every address with a presence record.
    #[schema(value_type = Object)]
    pub seen: IndexMap<String, AddressView>,
    #[schema(value_type = Object)]
    pub names: IndexMap<AppId, String>,
    pub db_info: Option<DbInfo>,
}

/// Render a byte count with binary units and at most two decimals.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".into();
    }

    let mut exponent = 0;
    let mut threshold: u64 = 1024;
    while exponent < UNITS.len() - 1 && bytes >= threshold {
        exponent += 1;
        threshold = threshold.saturating_mul(1024);
    }
    let scaled = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[exponent])
}
