/// Identity Service Main Entry Point
///
/// Starts the HTTP server with:
/// - PostgreSQL connection pool and migrations
/// - RS256 key material loaded up front
/// - Tokio-backed background tasks for the login counter
use anyhow::{Context, Result};
use identity_service::{
    config::Settings,
    db::PgUserStore,
    http::{start_http_server, AppState},
    security::TokenService,
    services::{IdentityService, TokioBackgroundTasks},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "identity_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Identity Service");

    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;
    info!("Configuration loaded successfully");

    // Fail fast on unreadable keys instead of on the first login
    let tokens = Arc::new(TokenService::new(settings.jwt.keys.clone()));
    tokens
        .preload()
        .context("Failed to initialize JWT keys")?;
    info!("JWT keys initialized");

    // Initialize database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .connect(&settings.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    info!(
        "Database pool initialized with {} max connections",
        settings.database.max_connections
    );

    // Run database migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations completed");

    let identity = IdentityService::new(
        Arc::new(PgUserStore::new(db_pool)),
        tokens,
        Arc::new(TokioBackgroundTasks),
        settings.identity(),
    );

    start_http_server(
        AppState { identity },
        &settings.server.host,
        settings.server.port,
        shutdown_signal(),
    )
    .await
    .context("HTTP server error")?;

    info!("Identity service shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
