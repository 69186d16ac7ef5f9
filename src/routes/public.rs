use axum::{Json, Router, extract::State, routing::post};
use axum_valid::Valid;

use crate::{
    dto::public::{ReportGameRequest, ReportGameResponse},
    error::AppError,
    services::catalog_service::{self, ReportOutcome},
    state::SharedState,
};

/// Unauthenticated client endpoints besides presence.
pub fn router() -> Router<SharedState> {
    Router::new().route("/api/reportGame", post(report_game))
}

#[utoipa::path(
    post,
    path = "/api/reportGame",
    tag = "public",
    request_body = ReportGameRequest,
    responses(
        (status = 200, description = "Game known, added or rejected", body = ReportGameResponse),
        (status = 400, description = "Invalid report")
    )
)]
/// Report the application a client runs, adding it to the library when it is new.
pub async fn report_game(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<ReportGameRequest>>,
) -> Result<Json<ReportGameResponse>, AppError> {
    let response = match catalog_service::report_game(&state, request.app_id, request.mode).await? {
        ReportOutcome::Rejected => ReportGameResponse::rejected(),
        ReportOutcome::Known(game) | ReportOutcome::Added(game) => {
            ReportGameResponse::accepted(game)
        }
    };
    Ok(Json(response))
}
