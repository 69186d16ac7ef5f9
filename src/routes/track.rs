use axum::{Json, Router, body::Bytes, extract::State, routing::get};
use validator::Validate;

use crate::{
    dto::track::{TrackRequest, TrackResponse},
    error::AppError,
    routes::client_ip::ClientIp,
    services::presence_service,
    state::SharedState,
};

/// Presence endpoint polled by clients.
pub fn router() -> Router<SharedState> {
    Router::new().route("/api/track", get(track_ping).post(track_visit))
}

/// Record a visit from the calling address and return the active count.
///
/// The body is optional: an empty one is treated as `{}` whatever the content type.
#[utoipa::path(
    post,
    path = "/api/track",
    tag = "track",
    request_body(content = TrackRequest, description = "Visit report; may be empty"),
    responses(
        (status = 200, description = "Visit recorded", body = TrackResponse),
        (status = 400, description = "Invalid report"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn track_visit(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<Json<TrackResponse>, AppError> {
    let request = parse_report(&body)?;
    let response = presence_service::track(&state, ip, request).await?;
    Ok(Json(response))
}

/// Record an anonymous online visit from the calling address.
#[utoipa::path(
    get,
    path = "/api/track",
    tag = "track",
    responses(
        (status = 200, description = "Visit recorded", body = TrackResponse),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn track_ping(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
) -> Result<Json<TrackResponse>, AppError> {
    let response = presence_service::track(&state, ip, TrackRequest::default()).await?;
    Ok(Json(response))
}

fn parse_report(body: &[u8]) -> Result<TrackRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TrackRequest::default());
    }
    let request: TrackRequest = serde_json::from_slice(body)
        .map_err(|err| AppError::BadRequest(format!("malformed visit report: {err}")))?;
    request.validate()?;
    Ok(request)
}
