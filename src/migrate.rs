use anyhow::Result;
use sqlx::SqlitePool;

/// Create the metadata schema. Safe to run on every start.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per cached analysis result
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache_metadata (
            fingerprint TEXT PRIMARY KEY,
            level TEXT NOT NULL,
            source_name TEXT NOT NULL,
            byte_size INTEGER NOT NULL,
            page_number INTEGER,
            parent_fingerprint TEXT,
            processing_time REAL NOT NULL DEFAULT 0,
            content_length INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            last_accessed_at INTEGER NOT NULL,
            access_count INTEGER NOT NULL DEFAULT 0,
            CHECK (level IN ('full_document', 'page')),
            CHECK ((level = 'page') = (page_number IS NOT NULL AND parent_fingerprint IS NOT NULL))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_level ON cache_metadata(level)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_cache_parent ON cache_metadata(parent_fingerprint)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_cache_source ON cache_metadata(source_name)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_cache_last_accessed ON cache_metadata(last_accessed_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
