//! Session repository
//!
//! Reads and conditional writes on attendance sessions:
//! - `SessionRepository` trait used by the evaluator, rotator and sweep
//! - `SqlxSessionRepository` implementing it for SQLite and MySQL
//!
//! Every write touches only the columns it owns, so a token rotation and a
//! concurrent deactivation never overwrite each other.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// List sessions still flagged active
    async fn list_active(&self) -> Result<Vec<Session>>;

    /// Clear the active flag. Returns false when the session was already
    /// inactive or does not exist.
    async fn deactivate(&self, id: &str) -> Result<bool>;

    /// Overwrite the session token. Returns false when the session does not exist.
    async fn store_token(&self, id: &str, token: &str, at: DateTime<Utc>) -> Result<bool>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }

    fn sqlite(&self) -> Result<&SqlitePool> {
        self.pool.as_sqlite().context("SQLite pool unavailable")
    }

    fn mysql(&self) -> Result<&MySqlPool> {
        self.pool.as_mysql().context("MySQL pool unavailable")
    }
}

const INSERT_SESSION: &str = r#"
    INSERT INTO sessions (id, start_time, end_time, tolerance_minutes, active, dynamic_qr_code, last_updated)
    VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

const SELECT_BY_ID: &str = r#"
    SELECT id, start_time, end_time, tolerance_minutes, active, dynamic_qr_code, last_updated
    FROM sessions
    WHERE id = ?
"#;

const SELECT_ACTIVE: &str = r#"
    SELECT id, start_time, end_time, tolerance_minutes, active, dynamic_qr_code, last_updated
    FROM sessions
    WHERE active = ?
    ORDER BY id
"#;

const DEACTIVATE: &str = "UPDATE sessions SET active = ? WHERE id = ? AND active = ?";

const STORE_TOKEN: &str = "UPDATE sessions SET dynamic_qr_code = ?, last_updated = ? WHERE id = ?";

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_session_sqlite(self.sqlite()?, session).await,
            DatabaseDriver::Mysql => create_session_mysql(self.mysql()?, session).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SELECT_BY_ID)
                    .bind(id)
                    .fetch_optional(self.sqlite()?)
                    .await
                    .context("Failed to get session by ID")?;
                row.as_ref().map(row_to_session_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SELECT_BY_ID)
                    .bind(id)
                    .fetch_optional(self.mysql()?)
                    .await
                    .context("Failed to get session by ID")?;
                row.as_ref().map(row_to_session_mysql).transpose()
            }
        }
    }

    async fn list_active(&self) -> Result<Vec<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(SELECT_ACTIVE)
                    .bind(true)
                    .fetch_all(self.sqlite()?)
                    .await
                    .context("Failed to list active sessions")?;
                rows.iter().map(row_to_session_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(SELECT_ACTIVE)
                    .bind(true)
                    .fetch_all(self.mysql()?)
                    .await
                    .context("Failed to list active sessions")?;
                rows.iter().map(row_to_session_mysql).collect()
            }
        }
    }

    async fn deactivate(&self, id: &str) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DEACTIVATE)
                .bind(false)
                .bind(id)
                .bind(true)
                .execute(self.sqlite()?)
                .await
                .context("Failed to deactivate session")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DEACTIVATE)
                .bind(false)
                .bind(id)
                .bind(true)
                .execute(self.mysql()?)
                .await
                .context("Failed to deactivate session")?
                .rows_affected(),
        };

        Ok(affected > 0)
    }

    async fn store_token(&self, id: &str, token: &str, at: DateTime<Utc>) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(STORE_TOKEN)
                .bind(token)
                .bind(at)
                .bind(id)
                .execute(self.sqlite()?)
                .await
                .context("Failed to store session token")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(STORE_TOKEN)
                .bind(token)
                .bind(at)
                .bind(id)
                .execute(self.mysql()?)
                .await
                .context("Failed to store session token")?
                .rows_affected(),
        };

        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    sqlx::query(INSERT_SESSION)
        .bind(&session.id)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.tolerance_minutes)
        .bind(session.active)
        .bind(&session.dynamic_qr_code)
        .bind(session.last_updated)
        .execute(pool)
        .await
        .context("Failed to create session")?;

    Ok(session.clone())
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
    Ok(Session {
        id: row.try_get("id")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        tolerance_minutes: row.try_get("tolerance_minutes")?,
        active: row.try_get("active")?,
        dynamic_qr_code: row.try_get("dynamic_qr_code")?,
        last_updated: row.try_get("last_updated")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_session_mysql(pool: &MySqlPool, session: &Session) -> Result<Session> {
    sqlx::query(INSERT_SESSION)
        .bind(&session.id)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.tolerance_minutes)
        .bind(session.active)
        .bind(&session.dynamic_qr_code)
        .bind(session.last_updated)
        .execute(pool)
        .await
        .context("Failed to create session")?;

    Ok(session.clone())
}

fn row_to_session_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Session> {
    Ok(Session {
        id: row.try_get("id")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        tolerance_minutes: row.try_get("tolerance_minutes")?,
        active: row.try_get("active")?,
        dynamic_qr_code: row.try_get("dynamic_qr_code")?,
        last_updated: row.try_get("last_updated")?,
    })
}
