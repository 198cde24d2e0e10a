use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::CacheConfig;

/// Open the metadata index at `<cache dir>/cache_metadata.db`.
pub async fn connect(config: &CacheConfig) -> Result<SqlitePool> {
    let db_path = config.db_path();

    // Ensure the cache root exists
    std::fs::create_dir_all(&config.dir)
        .with_context(|| format!("Failed to create cache dir: {}", config.dir.display()))?;

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open metadata index: {}", db_path.display()))?;

    Ok(pool)
}
