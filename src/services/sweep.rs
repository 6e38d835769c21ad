//! Periodic session deactivation
//!
//! Walks every active session and applies the same closure rule as the
//! request path. Runs alongside request handling; the only shared state is
//! the session store.

use anyhow::Result;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::db::repositories::SessionRepository;
use crate::services::clock::{to_local, Clock};
use crate::services::window::{close_if_expired, WindowPolicy, WindowStatus};

pub struct SessionSweeper {
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
    policy: WindowPolicy,
}

impl SessionSweeper {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
        timezone: Tz,
        policy: WindowPolicy,
    ) -> Self {
        Self {
            sessions,
            clock,
            timezone,
            policy,
        }
    }

    /// Deactivate every expired session; returns how many were closed.
    ///
    /// A failure on one session is logged and does not stop the pass.
    pub async fn run_once(&self) -> Result<usize> {
        let now = to_local(self.clock.now(), self.timezone);
        let active = self.sessions.list_active().await?;
        let mut closed = 0;

        for mut session in active {
            let evaluation = close_if_expired(&mut session, now, self.policy);
            if evaluation.status == WindowStatus::MissingWindow {
                tracing::debug!(session_id = %session.id, "Session has no time window, skipping");
                continue;
            }
            if !evaluation.deactivate {
                continue;
            }

            match self.sessions.deactivate(&session.id).await {
                Ok(true) => {
                    tracing::info!(session_id = %session.id, "Session deactivated");
                    closed += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(session_id = %session.id, "Failed to deactivate session: {:#}", e);
                }
            }
        }

        Ok(closed)
    }

    /// Run [`run_once`](Self::run_once) on a fixed interval until the task is aborted
    pub fn spawn(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match self.run_once().await {
                    Ok(0) => tracing::debug!("Sweep finished, nothing to close"),
                    Ok(n) => tracing::info!("Sweep closed {} session(s)", n),
                    Err(e) => tracing::warn!("Session sweep failed: {:#}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxSessionRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::Session;
    use crate::services::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 13, 0, 0).unwrap()
    }

    async fn setup() -> (Arc<dyn SessionRepository>, Arc<ManualClock>, SessionSweeper) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let sessions = SqlxSessionRepository::boxed(pool);
        let clock = Arc::new(ManualClock::new(start()));
        let sweeper = SessionSweeper::new(
            sessions.clone(),
            clock.clone(),
            chrono_tz::America::Lima,
            WindowPolicy::RegistrationLate,
        );
        (sessions, clock, sweeper)
    }

    fn session(id: &str, tolerance: i64) -> Session {
        Session::new(
            id,
            Some(start()),
            Some(start() + chrono::Duration::hours(1)),
            Some(tolerance),
        )
    }

    #[tokio::test]
    async fn test_sweep_closes_only_expired_sessions() {
        let (sessions, clock, sweeper) = setup().await;
        sessions.create(&session("short", 1)).await.unwrap();
        sessions.create(&session("long", 30)).await.unwrap();
        clock.advance(chrono::Duration::minutes(10));

        let closed = sweeper.run_once().await.expect("Sweep failed");
        assert_eq!(closed, 1);

        assert!(!sessions.get_by_id("short").await.unwrap().unwrap().active);
        assert!(sessions.get_by_id("long").await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let (sessions, clock, sweeper) = setup().await;
        sessions.create(&session("s1", 1)).await.unwrap();
        clock.advance(chrono::Duration::minutes(10));

        assert_eq!(sweeper.run_once().await.unwrap(), 1);
        assert_eq!(sweeper.run_once().await.unwrap(), 0);
        assert!(!sessions.get_by_id("s1").await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_sweep_skips_sessions_without_window() {
        let (sessions, clock, sweeper) = setup().await;
        sessions
            .create(&Session::new("bare", None, None, None))
            .await
            .unwrap();
        clock.advance(chrono::Duration::days(30));

        assert_eq!(sweeper.run_once().await.unwrap(), 0);
        assert!(sessions.get_by_id("bare").await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_spawned_sweep_runs_immediately() {
        let (sessions, clock, sweeper) = setup().await;
        sessions.create(&session("s1", 1)).await.unwrap();
        clock.advance(chrono::Duration::minutes(10));

        let handle = Arc::new(sweeper).spawn(Duration::from_secs(3600));
        for _ in 0..50 {
            if !sessions.get_by_id("s1").await.unwrap().unwrap().active {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();

        assert!(!sessions.get_by_id("s1").await.unwrap().unwrap().active);
    }
}
