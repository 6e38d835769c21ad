//! Database layer
//!
//! Storage for attendance sessions and class tokens. SQLite is the default
//! backend; MySQL is selected through `database.driver`.
//!
//! ```ignore
//! use qr_attendance::config::DatabaseConfig;
//! use qr_attendance::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
