/// Database layer for the Sabil registry
///
/// Owns the single SQLite pool shared by every manager. The pool is built
/// once at startup, migrated, and then cloned into each service.

pub mod account;

use crate::error::{RegistryError, RegistryResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::{path::Path, str::FromStr};

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> RegistryResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RegistryError::Internal(format!("Failed to create directory {:?}: {}", parent, e))
            })?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    SqliteJournalMode::Wal
                } else {
                    SqliteJournalMode::Delete
                })
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await?;

    Ok(pool)
}

/// In-memory pool with a single connection so every query sees the same database
pub async fn create_memory_pool() -> RegistryResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true))
        .await?;

    Ok(pool)
}

/// Run migrations for a database
/// Migrations are embedded at compile time from ./migrations directory
pub async fn run_migrations(pool: &SqlitePool) -> RegistryResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| RegistryError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Open a write transaction that takes the database write lock up front.
/// Read-then-write transactions started as DEFERRED fail with SQLITE_BUSY
/// when two of them try to upgrade at once; IMMEDIATE ones queue on the
/// busy timeout instead.
pub async fn begin_write(pool: &SqlitePool) -> RegistryResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> RegistryResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Migrated in-memory pool for tests
pub async fn test_pool() -> RegistryResult<SqlitePool> {
    let pool = create_memory_pool().await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
