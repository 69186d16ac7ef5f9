use axum::Router;

use crate::state::SharedState;

pub mod admin;
pub mod client_ip;
pub mod docs;
pub mod health;
pub mod public;
pub mod track;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(track::router())
        .merge(public::router())
        .merge(admin::router(state.clone()))
        .merge(docs::router());

    api_router.with_state(state)
}
