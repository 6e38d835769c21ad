//! API layer - HTTP handlers and routing

pub mod middleware;
pub mod qr;

use anyhow::Context;
use axum::{middleware as axum_middleware, routing::get, Router};
use std::sync::Arc;
use tera::Tera;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::repositories::{SqlxClassTokenRepository, SqlxSessionRepository};
use crate::db::DynDatabasePool;
use crate::services::{AttendanceService, Clock, QrRenderer, TokenRotator};

pub use middleware::{ApiError, AppState};

/// Wire repositories and services into the shared state
pub fn build_state(config: &Config, pool: DynDatabasePool, clock: Arc<dyn Clock>) -> anyhow::Result<AppState> {
    let sessions = SqlxSessionRepository::boxed(pool.clone());
    let class_tokens = SqlxClassTokenRepository::boxed(pool);

    let rotator = TokenRotator::new(sessions.clone(), class_tokens, clock.clone());
    let attendance = AttendanceService::new(
        sessions,
        rotator,
        clock,
        config.attendance.tz()?,
        config.attendance.window_policy,
    );

    Ok(AppState {
        attendance: Arc::new(attendance),
        qr_renderer: Arc::new(QrRenderer::new(&config.qr)),
        pages: Arc::new(page_templates()?),
        refresh_seconds: config.attendance.refresh_seconds,
    })
}

/// Load the HTML templates served by the API
pub fn page_templates() -> anyhow::Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_template(qr::QR_PAGE, include_str!("templates/qr_page.html"))
        .with_context(|| format!("Failed to add template {}", qr::QR_PAGE))?;
    Ok(tera)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(qr::qr_page))
        .route("/generate_qr", get(qr::generate_qr))
        .route("/server_time", get(qr::server_time))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(middleware::add_no_store_headers)),
        )
        .with_state(state)
}
