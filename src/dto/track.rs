//! DTOs for the client presence endpoint.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::{AppId, GameFields};

/// Presence state reported by a client alongside its visit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    Offline,
    #[default]
    #[serde(other)]
    Online,
}

/// Visit report sent by clients roughly every 15 seconds.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    #[serde(default)]
    #[validate(length(max = 64))]
    pub username: Option<String>,
    /// Legacy alias for `username`.
    #[serde(default)]
    #[validate(length(max = 64))]
    pub discord: Option<String>,
    /// Legacy alias for `username`.
    #[serde(default)]
    #[validate(length(max = 64))]
    pub name: Option<String>,
    /// Hardware/account identity shared across the client's addresses. Blank means absent.
    #[serde(default)]
    #[validate(length(max = 128))]
    pub serial: Option<String>,
    #[serde(default)]
    pub status: VisitStatus,
    /// Application the client is currently running, if any.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub app_id: Option<AppId>,
}

impl TrackRequest {
    /// First non-blank username among the accepted field names.
    pub fn username(&self) -> Option<String> {
        [&self.username, &self.discord, &self.name]
            .into_iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .map(str::to_owned)
    }
}

/// Library status of the application reported with a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Known,
    Unknown,
    Rejected,
}

#[skip_serializing_none]
#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackExtra {
    pub game_status: Option<GameStatus>,
    pub game: Option<GameFields>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackResponse {
    pub ok: bool,
    pub ip: String,
    /// Addresses seen within the active window; absent when the caller is banned.
    pub active_count: Option<u64>,
    /// Same value as `activeCount`, kept for older clients.
    pub active: Option<u64>,
    pub banned: bool,
    pub extra: TrackExtra,
}
