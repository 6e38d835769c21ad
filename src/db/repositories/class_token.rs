//! Class token repository
//!
//! One row per class holding the most recently issued token and its computed
//! expiry. Issuing a new token replaces the row; no history is retained.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::ClassToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait ClassTokenRepository: Send + Sync {
    /// Insert or replace the token for a class
    async fn upsert(&self, token: &ClassToken) -> Result<()>;

    /// Current token for a class
    async fn get_by_class(&self, class_id: &str) -> Result<Option<ClassToken>>;
}

pub struct SqlxClassTokenRepository {
    pool: DynDatabasePool,
}

impl SqlxClassTokenRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ClassTokenRepository> {
        Arc::new(Self::new(pool))
    }
}

const UPSERT_SQLITE: &str = r#"
    INSERT INTO class_tokens (class_id, token, duration_minutes, expires_at, last_updated)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT(class_id) DO UPDATE SET
        token = excluded.token,
        duration_minutes = excluded.duration_minutes,
        expires_at = excluded.expires_at,
        last_updated = excluded.last_updated
"#;

const UPSERT_MYSQL: &str = r#"
    INSERT INTO class_tokens (class_id, token, duration_minutes, expires_at, last_updated)
    VALUES (?, ?, ?, ?, ?)
    ON DUPLICATE KEY UPDATE
        token = VALUES(token),
        duration_minutes = VALUES(duration_minutes),
        expires_at = VALUES(expires_at),
        last_updated = VALUES(last_updated)
"#;

const SELECT_BY_CLASS: &str = r#"
    SELECT class_id, token, duration_minutes, expires_at, last_updated
    FROM class_tokens
    WHERE class_id = ?
"#;

#[async_trait]
impl ClassTokenRepository for SqlxClassTokenRepository {
    async fn upsert(&self, token: &ClassToken) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.as_sqlite().context("SQLite pool unavailable")?;
                sqlx::query(UPSERT_SQLITE)
                    .bind(&token.class_id)
                    .bind(&token.token)
                    .bind(token.duration_minutes)
                    .bind(token.expires_at)
                    .bind(token.last_updated)
                    .execute(pool)
                    .await
                    .context("Failed to store class token")?;
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.as_mysql().context("MySQL pool unavailable")?;
                sqlx::query(UPSERT_MYSQL)
                    .bind(&token.class_id)
                    .bind(&token.token)
                    .bind(token.duration_minutes)
                    .bind(token.expires_at)
                    .bind(token.last_updated)
                    .execute(pool)
                    .await
                    .context("Failed to store class token")?;
            }
        }

        Ok(())
    }

    async fn get_by_class(&self, class_id: &str) -> Result<Option<ClassToken>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.as_sqlite().context("SQLite pool unavailable")?;
                let row = sqlx::query(SELECT_BY_CLASS)
                    .bind(class_id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get class token")?;
                row.as_ref().map(row_to_class_token_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.as_mysql().context("MySQL pool unavailable")?;
                let row = sqlx::query(SELECT_BY_CLASS)
                    .bind(class_id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get class token")?;
                row.as_ref().map(row_to_class_token_mysql).transpose()
            }
        }
    }
}

fn row_to_class_token_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<ClassToken> {
    Ok(ClassToken {
        class_id: row.try_get("class_id")?,
        token: row.try_get("token")?,
        duration_minutes: row.try_get("duration_minutes")?,
        expires_at: row.try_get("expires_at")?,
        last_updated: row.try_get("last_updated")?,
    })
}

fn row_to_class_token_mysql(row: &sqlx::mysql::MySqlRow) -> Result<ClassToken> {
    Ok(ClassToken {
        class_id: row.try_get("class_id")?,
        token: row.try_get("token")?,
        duration_minutes: row.try_get("duration_minutes")?,
        expires_at: row.try_get("expires_at")?,
        last_updated: row.try_get("last_updated")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::{Duration, TimeZone, Utc};

    async fn setup_test_repo() -> SqlxClassTokenRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxClassTokenRepository::new(pool)
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_replaces() {
        let repo = setup_test_repo().await;
        let at = Utc.with_ymd_and_hms(2024, 9, 2, 13, 0, 0).unwrap();

        let first = ClassToken::issue("physics", "AAAAAAAAAAAAAAAA".to_string(), 1, at);
        repo.upsert(&first).await.expect("Failed to insert token");

        let second = ClassToken::issue(
            "physics",
            "BBBBBBBBBBBBBBBB".to_string(),
            5,
            at + Duration::minutes(1),
        );
        repo.upsert(&second).await.expect("Failed to replace token");

        let stored = repo
            .get_by_class("physics")
            .await
            .expect("Failed to read token")
            .expect("Token missing");
        assert_eq!(stored, second);
    }

    #[tokio::test]
    async fn test_get_by_class_not_found() {
        let repo = setup_test_repo().await;
        assert!(repo.get_by_class("nobody").await.unwrap().is_none());
    }
}
