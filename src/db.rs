//! SQLite connection handling for the resume index.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::DbConfig;
use crate::migrate;

/// Open (creating if needed) the database file at `db.path`.
pub async fn connect(db: &DbConfig) -> Result<SqlitePool> {
    if let Some(parent) = db.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(&db.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database {}", db.path.display()))?;

    Ok(pool)
}

/// Connect and make sure the schema exists.
pub async fn open(db: &DbConfig) -> Result<SqlitePool> {
    let pool = connect(db).await?;
    migrate::run_migrations(&pool).await?;
    Ok(pool)
}
