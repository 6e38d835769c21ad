//! Shared setup for HTTP tests.

use std::sync::Arc;

use axum_test::TestServer;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use qr_attendance::api;
use qr_attendance::config::Config;
use qr_attendance::db::repositories::{
    ClassTokenRepository, SessionRepository, SqlxClassTokenRepository, SqlxSessionRepository,
};
use qr_attendance::db::{create_test_pool, migrations};
use qr_attendance::models::Session;
use qr_attendance::services::ManualClock;

pub struct TestApp {
    pub server: TestServer,
    pub sessions: Arc<dyn SessionRepository>,
    pub class_tokens: Arc<dyn ClassTokenRepository>,
    pub clock: Arc<ManualClock>,
    // Keeps the logo directory alive for the duration of the test
    _assets: TempDir,
}

/// 08:00 in Lima on a Monday
pub fn class_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 13, 0, 0).unwrap()
}

/// Build the full router over an in-memory store, with the clock at
/// [`class_start`] and no logo asset.
pub async fn spawn_app() -> TestApp {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let assets = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = Config::default();
    config.qr.logo_path = assets.path().join("logo.png");

    let clock = Arc::new(ManualClock::new(class_start()));
    let state = api::build_state(&config, pool.clone(), clock.clone()).expect("Failed to build state");
    let server = TestServer::new(api::build_router(state)).expect("Failed to start test server");

    TestApp {
        server,
        sessions: SqlxSessionRepository::boxed(pool.clone()),
        class_tokens: SqlxClassTokenRepository::boxed(pool),
        clock,
        _assets: assets,
    }
}

/// Seed a two-hour session starting at [`class_start`]
pub async fn seed_session(app: &TestApp, id: &str, tolerance_minutes: i64) {
    app.sessions
        .create(&Session::new(
            id,
            Some(class_start()),
            Some(class_start() + Duration::hours(2)),
            Some(tolerance_minutes),
        ))
        .await
        .expect("Failed to seed session");
}
