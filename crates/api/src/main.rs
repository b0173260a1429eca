use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fanout_api::config::ServerConfig;
use fanout_api::router::build_app_router;
use fanout_api::state::AppState;
use fanout_engine::{Engine, EngineConfig, SqlAccountStore};
use fanout_events::EventBus;
use fanout_remote::HttpConnector;
use tokio_util::task::TaskTracker;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fanout_api=debug,fanout_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let engine_config = EngineConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        concurrency = engine_config.concurrency,
        remote_api_base = %engine_config.remote_api_base,
        "Loaded configuration",
    );

    // --- Database ---
    let pool = fanout_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    fanout_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    fanout_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Engine ---
    let connector = HttpConnector::new(
        engine_config.remote_api_base.clone(),
        engine_config.remote_timeout(),
    )
    .expect("Failed to build remote HTTP client");

    let engine = Engine::new(
        pool.clone(),
        Arc::new(EventBus::default()),
        Arc::new(connector),
        Arc::new(SqlAccountStore::new(pool.clone())),
    )
    .with_concurrency(engine_config.concurrency);

    let tracker = TaskTracker::new();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine: Arc::new(engine),
        tracker: tracker.clone(),
    };

    let app = build_app_router(state, &config);

    // --- Serve ---
    let addr = SocketAddr::new(config.host.parse().expect("Invalid HOST"), config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Drain background executions ---
    tracker.close();
    tracing::info!(
        in_flight = tracker.len(),
        "Server stopped accepting connections, waiting for job executions",
    );
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(drain, tracker.wait()).await.is_err() {
        tracing::warn!(
            in_flight = tracker.len(),
            "Shutdown timeout elapsed with job executions still running",
        );
    }

    tracing::info!("Shutdown complete");
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
