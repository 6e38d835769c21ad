//! QR attendance server

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qr_attendance::{
    api,
    config::Config,
    db::{self, repositories::SqlxSessionRepository},
    services::{Clock, SessionSweeper, SystemClock},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qr_attendance=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting QR attendance server...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!(
        "Configuration loaded (timezone {}, policy {:?})",
        config.attendance.timezone,
        config.attendance.window_policy
    );

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    pool.ping().await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = api::build_state(&config, pool.clone(), clock.clone())?;

    // Start the session sweep
    let sweep = if config.sweep.enabled {
        let sweeper = Arc::new(SessionSweeper::new(
            SqlxSessionRepository::boxed(pool.clone()),
            clock,
            config.attendance.tz()?,
            config.attendance.window_policy,
        ));
        tracing::info!("Session sweep every {}s", config.sweep.interval_seconds);
        Some(sweeper.spawn(Duration::from_secs(config.sweep.interval_seconds)))
    } else {
        tracing::info!("Session sweep disabled");
        None
    };

    // Build router
    let app = api::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweep {
        handle.abort();
    }
    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
