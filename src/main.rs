//! zoream-back binary entrypoint wiring configuration, storage and the HTTP layer.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zoream_back::{
    build_router,
    config::AppConfig,
    dao::tracker_store::memory::MemoryTrackerStore,
    services::name_lookup::SteamNameLookup,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let port = config.port;
    let lookup = Arc::new(SteamNameLookup::new(config.name_lookup_url.clone()));
    let app_state = AppState::new(config, lookup);

    start_storage(app_state.clone()).await;

    let app = build_router(app_state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the configured backend: a supervised MongoDB connection, or process memory.
async fn start_storage(state: SharedState) {
    let Some(uri) = state.config().mongo_uri.clone() else {
        warn!("MONGO_URI not set; keeping tracker state in memory");
        state.install_store(Arc::new(MemoryTrackerStore::new())).await;
        return;
    };
    spawn_mongo_supervisor(state, uri);
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: SharedState, uri: String) {
    use zoream_back::{
        dao::{
            storage::StorageError,
            tracker_store::{
                TrackerStore,
                mongodb::{MongoConfig, MongoTrackerStore},
            },
        },
        services::storage_supervisor,
    };

    let db_name = state.config().mongo_db.clone();
    tokio::spawn(storage_supervisor::run(state, move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
            let store = MongoTrackerStore::connect(config).await?;
            Ok::<Arc<dyn TrackerStore>, StorageError>(Arc::new(store))
        }
    }));
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(state: SharedState, _uri: String) {
    warn!("built without `mongo-store`; ignoring MONGO_URI and keeping tracker state in memory");
    tokio::spawn(async move {
        state.install_store(Arc::new(MemoryTrackerStore::new())).await;
    });
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; only Ctrl+C stops the server");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
