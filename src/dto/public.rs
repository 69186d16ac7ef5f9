use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::models::{AppId, GameFields};

/// Application reported by a client that may not be in the library yet.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportGameRequest {
    #[schema(value_type = String)]
    pub app_id: AppId,
    #[serde(default)]
    #[validate(range(max = 1))]
    pub mode: Option<u8>,
}

/// Outcome of a game report.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct ReportGameResponse {
    pub ok: bool,
    /// `rejected` when the application is on the rejected list.
    pub reason: Option<String>,
    pub game: Option<GameFields>,
}

impl ReportGameResponse {
    pub fn rejected() -> Self {
        Self {
            ok: false,
            reason: Some("rejected".into()),
            game: None,
        }
    }

    pub fn accepted(game: GameFields) -> Self {
        Self {
            ok: true,
            reason: None,
            game: Some(game),
        }
    }
}
