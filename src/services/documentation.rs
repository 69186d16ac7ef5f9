use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the tracker backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::track::track_visit,
        crate::routes::track::track_ping,
        crate::routes::public::report_game,
        crate::routes::admin::admin_state,
        crate::routes::admin::ban,
        crate::routes::admin::unban,
        crate::routes::admin::ban_serial,
        crate::routes::admin::unban_serial,
        crate::routes::admin::add_game,
        crate::routes::admin::remove_game,
        crate::routes::admin::reject_game,
        crate::routes::admin::unreject_game,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::track::TrackRequest,
            crate::dto::track::TrackResponse,
            crate::dto::track::TrackExtra,
            crate::dto::track::GameStatus,
            crate::dto::track::VisitStatus,
            crate::dto::public::ReportGameRequest,
            crate::dto::public::ReportGameResponse,
            crate::dto::admin::BanRequest,
            crate::dto::admin::AddressRequest,
            crate::dto::admin::SerialRequest,
            crate::dto::admin::AppIdRequest,
            crate::dto::admin::AddGameRequest,
            crate::dto::admin::ActionResponse,
            crate::dto::admin::AdminStateResponse,
            crate::dto::snapshot::AdminSnapshot,
            crate::dto::snapshot::AddressView,
            crate::dto::snapshot::BannedAddressView,
            crate::dto::snapshot::DbInfo,
            crate::dao::models::GameFields,
            crate::dao::models::RejectedValue,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "track", description = "Client presence reporting"),
        (name = "public", description = "Unauthenticated client endpoints"),
        (name = "admin", description = "Password-protected moderation endpoints"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/api/track",
            "/api/reportGame",
            "/api/admin/state",
            "/api/admin/ban-serial",
            "/api/admin/unreject",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing `{path}`");
        }
    }
}
