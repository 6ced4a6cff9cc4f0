//! FC Roster Back binary entrypoint wiring the roster worker, scheduler, storage and HTTP layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fc_roster_back::{
    config::AppConfig,
    dao::{
        roster_store::{MemoryRosterStore, RosterStore},
        storage::StorageError,
    },
    routes,
    services::{
        capability::StaticCapabilities, persistence, scheduler, storage_supervisor,
    },
    state::{AppState, SharedState, clock::SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let capabilities = Arc::new(StaticCapabilities::from_config(&config));
    let schedule = scheduler::Schedule::from_config(&config);
    let snapshot_interval = config.snapshot_interval;

    let app_state = AppState::new(config, capabilities, Arc::new(SystemClock));

    tokio::spawn(persistence::run_snapshot_writer(app_state.clone()));
    spawn_storage_supervisor(app_state.clone());
    tokio::spawn(scheduler::run(app_state.clone(), schedule));
    tokio::spawn(scheduler::run_snapshot_checkpoint(
        app_state.clone(),
        snapshot_interval,
    ));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    // Last chance to persist what changed since the previous write.
    if app_state.is_restored() {
        let frame = app_state.snapshots().borrow().clone();
        if let Err(err) = persistence::save_frame(&app_state, &frame).await {
            warn!(error = %err, "final roster snapshot not saved");
        }
    }

    Ok(())
}

/// Pick the storage backend: MongoDB when `MONGO_URI` is set, the in-memory store otherwise.
fn spawn_storage_supervisor(state: SharedState) {
    #[cfg(feature = "mongo-store")]
    if env::var_os("MONGO_URI").is_some() {
        use fc_roster_back::dao::roster_store::mongodb::{MongoConfig, MongoRosterStore};

        info!("using MongoDB roster store");
        tokio::spawn(storage_supervisor::run(state, || async {
            let config = MongoConfig::from_env().await?;
            let store = MongoRosterStore::connect(config).await?;
            Ok::<Arc<dyn RosterStore>, StorageError>(Arc::new(store))
        }));
        return;
    }

    info!("MONGO_URI not set; roster kept in memory only");
    let store = MemoryRosterStore::new();
    tokio::spawn(storage_supervisor::run(state, move || {
        let store = store.clone();
        async move { Ok::<Arc<dyn RosterStore>, StorageError>(Arc::new(store)) }
    }));
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
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

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
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
