use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_valid::Valid;
use serde::Deserialize;

use crate::{
    dto::admin::{
        ActionResponse, AddGameRequest, AddressRequest, AdminStateResponse, AppIdRequest,
        BanRequest, SerialRequest,
    },
    error::AppError,
    routes::client_ip::ClientIp,
    services::{ban_service, catalog_service, snapshot_service},
    state::SharedState,
};

const ADMIN_PASS_HEADER: &str = "x-admin-pass";

/// Password-protected dashboard and moderation endpoints.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/api/admin/state", get(admin_state))
        .route("/api/admin/ban", post(ban))
        .route("/api/admin/unban", post(unban))
        .route("/api/admin/ban-serial", post(ban_serial))
        .route("/api/admin/unban-serial", post(unban_serial))
        .route("/api/admin/addgame", post(add_game))
        .route("/api/admin/removegame", post(remove_game))
        .route("/api/admin/reject", post(reject_game))
        .route("/api/admin/unreject", post(unreject_game))
        .route_layer(middleware::from_fn_with_state(state, require_admin_pass))
}

/// Return the aggregated dashboard state.
#[utoipa::path(
    get,
    path = "/api/admin/state",
    tag = "admin",
    params(("x-admin-pass" = String, Header, description = "Admin password")),
    responses(
        (status = 200, description = "Dashboard snapshot", body = AdminStateResponse),
        (status = 401, description = "Wrong or missing password"),
        (status = 503, description = "Storage unavailable and nothing cached")
    )
)]
pub async fn admin_state(
    State(state): State<SharedState>,
    ClientIp(caller): ClientIp,
) -> Result<Json<AdminStateResponse>, AppError> {
    let snapshot = snapshot_service::admin_state(&state, &caller).await?;
    Ok(Json(AdminStateResponse {
        ok: true,
        state: snapshot,
    }))
}

/// Ban one address (`ip`) or several (`ips`), following shared serials.
#[utoipa::path(
    post,
    path = "/api/admin/ban",
    tag = "admin",
    params(("x-admin-pass" = String, Header, description = "Admin password")),
    request_body = BanRequest,
    responses((status = 200, description = "Addresses banned", body = ActionResponse))
)]
pub async fn ban(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<BanRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcomes = ban_service::ban_many(&state, &request.targets()).await?;
    let affected: usize = outcomes.iter().map(|outcome| outcome.addresses.len()).sum();
    Ok(Json(ActionResponse::done(format!(
        "banned {affected} address(es)"
    ))))
}

/// Lift a ban on an address, its serial and the addresses sharing it.
#[utoipa::path(
    post,
    path = "/api/admin/unban",
    tag = "admin",
    params(("x-admin-pass" = String, Header, description = "Admin password")),
    request_body = AddressRequest,
    responses((status = 200, description = "Addresses unbanned", body = ActionResponse))
)]
pub async fn unban(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<AddressRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = ban_service::unban(&state, &request.ip).await?;
    Ok(Json(ActionResponse::done(format!(
        "unbanned {} address(es)",
        outcome.addresses.len()
    ))))
}

/// Ban a serial and every address carrying it.
#[utoipa::path(
    post,
    path = "/api/admin/ban-serial",
    tag = "admin",
    params(("x-admin-pass" = String, Header, description = "Admin password")),
    request_body = SerialRequest,
    responses((status = 200, description = "Serial banned", body = ActionResponse))
)]
pub async fn ban_serial(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<SerialRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = ban_service::ban_serial(&state, &request.serial).await?;
    Ok(Json(ActionResponse::done(format!(
        "banned serial `{}` and {} address(es)",
        request.serial,
        outcome.addresses.len()
    ))))
}

/// Lift the ban on a serial and every address carrying it.
#[utoipa::path(
    post,
    path = "/api/admin/unban-serial",
    tag = "admin",
    params(("x-admin-pass" = String, Header, description = "Admin password")),
    request_body = SerialRequest,
    responses((status = 200, description = "Serial unbanned", body = ActionResponse))
)]
pub async fn unban_serial(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<SerialRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let outcome = ban_service::unban_serial(&state, &request.serial).await?;
    Ok(Json(ActionResponse::done(format!(
        "unbanned serial `{}` and {} address(es)",
        request.serial,
        outcome.addresses.len()
    ))))
}

/// Add or replace a library entry.
#[utoipa::path(
    post,
    path = "/api/admin/addgame",
    tag = "admin",
    params(("x-admin-pass" = String, Header, description = "Admin password")),
    request_body = AddGameRequest,
    responses((status = 200, description = "Game stored", body = ActionResponse))
)]
pub async fn add_game(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<AddGameRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let app_id = request.app_id;
    let game = catalog_service::add_game(&state, app_id.clone(), request.mode).await?;
    Ok(Json(ActionResponse::done(format!(
        "game {app_id} stored with mode {}",
        game.mode
    ))))
}

/// Remove a library entry and its cached name.
#[utoipa::path(
    post,
    path = "/api/admin/removegame",
    tag = "admin",
    params(("x-admin-pass" = String, Header, description = "Admin password")),
    request_body = AppIdRequest,
    responses((status = 200, description = "Game removed", body = ActionResponse))
)]
pub async fn remove_game(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<AppIdRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let app_id = request.app_id;
    catalog_service::remove_game(&state, app_id.clone()).await?;
    Ok(Json(ActionResponse::done(format!("game {app_id} removed"))))
}

/// Move an application to the rejected list.
#[utoipa::path(
    post,
    path = "/api/admin/reject",
    tag = "admin",
    params(("x-admin-pass" = String, Header, description = "Admin password")),
    request_body = AppIdRequest,
    responses((status = 200, description = "Application rejected", body = ActionResponse))
)]
pub async fn reject_game(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<AppIdRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let app_id = request.app_id;
    catalog_service::reject_game(&state, app_id.clone()).await?;
    Ok(Json(ActionResponse::done(format!("game {app_id} rejected"))))
}

/// Lift a rejection, restoring the previous library entry when one was kept.
#[utoipa::path(
    post,
    path = "/api/admin/unreject",
    tag = "admin",
    params(("x-admin-pass" = String, Header, description = "Admin password")),
    request_body = AppIdRequest,
    responses((status = 200, description = "Rejection lifted", body = ActionResponse))
)]
pub async fn unreject_game(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<AppIdRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let app_id = request.app_id;
    let message = match catalog_service::unreject_game(&state, app_id.clone()).await? {
        Some(game) => format!("game {app_id} restored with mode {}", game.mode),
        None => format!("game {app_id} unrejected"),
    };
    Ok(Json(ActionResponse::done(message)))
}

#[derive(Debug, Default, Deserialize)]
struct AdminPassQuery {
    admin_pass: Option<String>,
}

/// Accept the password from the `x-admin-pass` header or the `admin_pass` query parameter.
async fn require_admin_pass(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_PASS_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .or_else(|| {
            Query::<AdminPassQuery>::try_from_uri(req.uri())
                .ok()
                .and_then(|Query(query)| query.admin_pass)
        })
        .ok_or_else(|| AppError::Unauthorized("missing admin password".into()))?;

    if provided == state.config().admin_pass {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Unauthorized("invalid admin password".into()))
    }
}
