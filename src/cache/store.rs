//! Two-level persistent cache of analysis results.
//!
//! Each entry is a JSON content artifact under `<root>/full_documents/` or
//! `<root>/pages/`, plus one row in the `cache_metadata` table. The artifact
//! is always written before the row, and an entry only counts as present
//! when both exist.
//!
//! The cache is an optimisation layer. `has`, `get`, `put`, and `remove`
//! never return errors: storage failures are logged and degrade to a miss
//! or a skipped write. Corrupt artifacts are deleted on read.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use texproof_core::{CacheEntry, CacheLevel, CachePayload, EntryScope, Fingerprint};
use walkdir::WalkDir;

use super::stats::{CacheStats, LevelStats, Recommendations, SessionSnapshot, SessionStats};
use crate::config::CacheConfig;
use crate::{db, migrate};

const SECS_PER_DAY: i64 = 86_400;

const SELECT_ENTRY: &str = "SELECT fingerprint, level, source_name, byte_size, page_number, \
     parent_fingerprint, processing_time, content_length, created_at, last_accessed_at, \
     access_count FROM cache_metadata";

/// On-disk artifact format. `P` is borrowed when writing, owned when reading.
#[derive(Serialize, Deserialize)]
struct Envelope<P> {
    fingerprint: Fingerprint,
    level: CacheLevel,
    source_name: String,
    cached_at: i64,
    payload: P,
}

/// Where a payload came from, recorded alongside it.
#[derive(Debug, Clone, Copy)]
pub struct EntryOrigin<'a> {
    pub source_name: &'a str,
    /// Size of the analysed input.
    pub byte_size: u64,
    pub processing_time_secs: f64,
}

/// Eviction rule. An entry matching any one criterion is removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanupCriteria {
    /// Last access older than this many days.
    pub older_than_days: u32,
    /// Accessed fewer times than this.
    pub min_access_count: u64,
    /// Input larger than this many bytes.
    pub max_size_bytes: Option<u64>,
}

impl Default for CleanupCriteria {
    fn default() -> Self {
        Self {
            older_than_days: 30,
            min_access_count: 1,
            max_size_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Artifacts (or leftover temp files) with no metadata row.
    pub orphan_artifacts: usize,
    /// Metadata rows whose artifact is missing.
    pub dangling_rows: usize,
}

pub struct CacheStore {
    pub(crate) pool: SqlitePool,
    root: PathBuf,
    large_entry_bytes: u64,
    stale_after_days: u32,
    session: SessionStats,
}

impl CacheStore {
    /// Open (creating if needed) the cache rooted at `config.dir`.
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        for level in CacheLevel::ALL {
            let dir = config.dir.join(level.dir_name());
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        Ok(Self {
            pool,
            root: config.dir.clone(),
            large_entry_bytes: config.large_entry_bytes,
            stale_after_days: config.stale_after_days,
            session: SessionStats::default(),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, fingerprint: &Fingerprint, level: CacheLevel) -> PathBuf {
        self.artifact_path_for(fingerprint.as_str(), level)
    }

    fn artifact_path_for(&self, key: &str, level: CacheLevel) -> PathBuf {
        self.root.join(level.dir_name()).join(format!("{}.json", key))
    }

    // ============ Session counters ============

    pub fn record_hit(&self, level: CacheLevel) {
        self.session.record_hit(level);
    }

    pub fn record_miss(&self, level: CacheLevel) {
        self.session.record_miss(level);
    }

    pub fn session(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    // ============ Per-entry operations ============

    /// True iff the metadata row exists and the artifact is a readable file.
    pub async fn has(&self, fingerprint: &Fingerprint, level: CacheLevel) -> bool {
        match self.row_exists(fingerprint, level).await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                tracing::warn!(fingerprint = fingerprint.short(), error = %e, "cache index lookup failed");
                return false;
            }
        }
        tokio::fs::metadata(self.artifact_path(fingerprint, level))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Fetch a payload and record the access. Unreadable entries are removed
    /// and reported as absent.
    pub async fn get(&self, fingerprint: &Fingerprint, level: CacheLevel) -> Option<CachePayload> {
        match self.row_exists(fingerprint, level).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                tracing::warn!(fingerprint = fingerprint.short(), error = %e, "cache index lookup failed");
                return None;
            }
        }

        let path = self.artifact_path(fingerprint, level);
        let decoded = match tokio::fs::read(&path).await {
            Ok(bytes) => decode_envelope(&bytes, fingerprint, level),
            Err(e) => Err(format!("unreadable artifact: {}", e)),
        };
        let payload = match decoded {
            Ok(payload) => payload,
            Err(reason) => {
                tracing::warn!(
                    fingerprint = fingerprint.short(),
                    %level,
                    %reason,
                    "corrupt cache entry; removing"
                );
                self.remove(fingerprint).await;
                return None;
            }
        };

        if let Err(e) = self.touch(fingerprint).await {
            tracing::warn!(fingerprint = fingerprint.short(), error = %e, "failed to record cache access");
        }
        Some(payload)
    }

    /// Write the artifact, then the row. Overwrites an existing entry with
    /// the same fingerprint. Returns false (after logging) on any failure.
    pub async fn put(
        &self,
        fingerprint: &Fingerprint,
        scope: EntryScope,
        payload: &CachePayload,
        origin: EntryOrigin<'_>,
    ) -> bool {
        let level = scope.level();
        match self.try_put(fingerprint, scope, payload, origin).await {
            Ok(()) => {
                tracing::debug!(fingerprint = fingerprint.short(), %level, source = origin.source_name, "cached");
                true
            }
            Err(e) => {
                tracing::warn!(
                    fingerprint = fingerprint.short(),
                    %level,
                    error = %format!("{:#}", e),
                    "cache write failed; continuing uncached"
                );
                false
            }
        }
    }

    async fn try_put(
        &self,
        fingerprint: &Fingerprint,
        scope: EntryScope,
        payload: &CachePayload,
        origin: EntryOrigin<'_>,
    ) -> Result<()> {
        let level = scope.level();
        if payload.level() != level {
            bail!(
                "payload level {} does not match entry level {}",
                payload.level(),
                level
            );
        }

        let now = now();
        let envelope = Envelope {
            fingerprint: fingerprint.clone(),
            level,
            source_name: origin.source_name.to_string(),
            cached_at: now,
            payload,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        let content_length = serde_json::to_string(payload)?.chars().count() as i64;

        self.write_artifact(fingerprint, level, &bytes).await?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO cache_metadata
                (fingerprint, level, source_name, byte_size, page_number, parent_fingerprint,
                 processing_time, content_length, created_at, last_accessed_at, access_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(fingerprint.as_str())
        .bind(level.as_str())
        .bind(origin.source_name)
        .bind(origin.byte_size as i64)
        .bind(scope.page_number().map(i64::from))
        .bind(scope.parent().map(|p| p.as_str().to_string()))
        .bind(origin.processing_time_secs)
        .bind(content_length)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to write cache metadata")?;

        Ok(())
    }

    /// Write to a temp file in the same directory, then rename over the target.
    async fn write_artifact(
        &self,
        fingerprint: &Fingerprint,
        level: CacheLevel,
        bytes: &[u8],
    ) -> Result<()> {
        let dir = self.root.join(level.dir_name());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let target = self.artifact_path(fingerprint, level);
        let tmp = dir.join(format!(".{}.{}.tmp", fingerprint, uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("Failed to move artifact to {}", target.display()));
        }
        Ok(())
    }

    /// Delete an entry's row and artifact. Page entries of a removed
    /// document are left alone. Returns true if anything was deleted.
    pub async fn remove(&self, fingerprint: &Fingerprint) -> bool {
        self.remove_key(fingerprint.as_str()).await
    }

    async fn remove_key(&self, key: &str) -> bool {
        let row_removed = match sqlx::query("DELETE FROM cache_metadata WHERE fingerprint = ?")
            .bind(key)
            .execute(&self.pool)
            .await
        {
            Ok(result) => result.rows_affected() > 0,
            Err(e) => {
                tracing::warn!(fingerprint = key, error = %e, "failed to delete cache row");
                false
            }
        };

        let mut artifact_removed = false;
        for level in CacheLevel::ALL {
            match tokio::fs::remove_file(self.artifact_path_for(key, level)).await {
                Ok(()) => artifact_removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(fingerprint = key, %level, error = %e, "failed to delete cache artifact")
                }
            }
        }
        row_removed || artifact_removed
    }

    async fn row_exists(
        &self,
        fingerprint: &Fingerprint,
        level: CacheLevel,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cache_metadata WHERE fingerprint = ? AND level = ?",
        )
        .bind(fingerprint.as_str())
        .bind(level.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn touch(&self, fingerprint: &Fingerprint) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE cache_metadata SET access_count = access_count + 1, last_accessed_at = ? \
             WHERE fingerprint = ?",
        )
        .bind(now())
        .bind(fingerprint.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ============ Queries and maintenance ============

    pub async fn entry(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
        let sql = format!("{} WHERE fingerprint = ?", SELECT_ENTRY);
        let row = sqlx::query(&sql)
            .bind(fingerprint.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(entry_from_row).transpose()
    }

    /// Entries, newest first, optionally restricted to one level.
    pub async fn list(&self, level: Option<CacheLevel>) -> Result<Vec<CacheEntry>> {
        let rows = match level {
            Some(level) => {
                let sql = format!(
                    "{} WHERE level = ? ORDER BY created_at DESC, fingerprint",
                    SELECT_ENTRY
                );
                sqlx::query(&sql)
                    .bind(level.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("{} ORDER BY created_at DESC, fingerprint", SELECT_ENTRY);
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };
        rows.iter().map(entry_from_row).collect()
    }

    /// Remove every entry matching any criterion. Failures on one entry are
    /// logged and do not stop the sweep.
    pub async fn cleanup(&self, criteria: CleanupCriteria) -> Result<usize> {
        let cutoff = now() - i64::from(criteria.older_than_days) * SECS_PER_DAY;
        let max_size = criteria.max_size_bytes.map(|b| b as i64);

        let keys: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT fingerprint FROM cache_metadata
            WHERE last_accessed_at < ?
               OR access_count < ?
               OR (? IS NOT NULL AND byte_size > ?)
            "#,
        )
        .bind(cutoff)
        .bind(criteria.min_access_count as i64)
        .bind(max_size)
        .bind(max_size)
        .fetch_all(&self.pool)
        .await?;

        let removed = self.remove_all(&keys).await;
        tracing::info!(removed, candidates = keys.len(), "cache cleanup finished");
        Ok(removed)
    }

    /// Remove entries of `level` created more than `days` days ago.
    pub async fn cleanup_created_before(&self, level: CacheLevel, days: u32) -> Result<usize> {
        let cutoff = now() - i64::from(days) * SECS_PER_DAY;
        let keys: Vec<String> = sqlx::query_scalar(
            "SELECT fingerprint FROM cache_metadata WHERE level = ? AND created_at < ?",
        )
        .bind(level.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let removed = self.remove_all(&keys).await;
        tracing::info!(removed, %level, days, "expired cache entries removed");
        Ok(removed)
    }

    async fn remove_all(&self, keys: &[String]) -> usize {
        let mut removed = 0;
        for key in keys {
            if self.remove_key(key).await {
                removed += 1;
            }
        }
        removed
    }

    pub async fn recommendations(&self) -> Result<Recommendations> {
        let stale_cutoff = now() - i64::from(self.stale_after_days) * SECS_PER_DAY;
        let (total, low_access, large, stale): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN access_count <= 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN byte_size > ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN last_accessed_at < ? THEN 1 ELSE 0 END), 0)
            FROM cache_metadata
            "#,
        )
        .bind(self.large_entry_bytes as i64)
        .bind(stale_cutoff)
        .fetch_one(&self.pool)
        .await?;

        let mut report = Recommendations {
            total_entries: total as u64,
            low_access_entries: low_access as u64,
            large_entries: large as u64,
            stale_entries: stale as u64,
            advice: Vec::new(),
            session: self.session(),
        };
        report.advise();
        Ok(report)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let rows: Vec<(String, i64, i64, f64, i64)> = sqlx::query_as(
            r#"
            SELECT
                level,
                COUNT(*),
                COALESCE(SUM(byte_size), 0),
                COALESCE(AVG(processing_time), 0.0),
                COALESCE(SUM(access_count), 0)
            FROM cache_metadata
            GROUP BY level
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut full_document = LevelStats::default();
        let mut page = LevelStats::default();
        for (level, entries, bytes, avg_secs, accesses) in rows {
            let stats = LevelStats {
                entries: entries as u64,
                total_bytes: bytes as u64,
                avg_processing_secs: avg_secs,
                total_accesses: accesses as u64,
            };
            match CacheLevel::parse(&level) {
                Some(CacheLevel::FullDocument) => full_document = stats,
                Some(CacheLevel::Page) => page = stats,
                None => tracing::warn!(level = %level, "unknown level in cache index"),
            }
        }

        let entries = full_document.entries + page.entries;
        let overall = LevelStats {
            entries,
            total_bytes: full_document.total_bytes + page.total_bytes,
            avg_processing_secs: if entries > 0 {
                (full_document.avg_processing_secs * full_document.entries as f64
                    + page.avg_processing_secs * page.entries as f64)
                    / entries as f64
            } else {
                0.0
            },
            total_accesses: full_document.total_accesses + page.total_accesses,
        };

        Ok(CacheStats {
            full_document,
            page,
            overall,
            session: self.session(),
        })
    }

    /// Reconcile the index with the content directories: drop rows whose
    /// artifact is gone and artifacts that no row claims.
    pub async fn prune_orphans(&self) -> Result<PruneReport> {
        let mut report = PruneReport::default();

        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT fingerprint, level FROM cache_metadata")
                .fetch_all(&self.pool)
                .await?;

        let mut known: HashSet<(String, CacheLevel)> = HashSet::with_capacity(rows.len());
        for (key, level) in rows {
            let Some(level) = CacheLevel::parse(&level) else {
                if self.remove_key(&key).await {
                    report.dangling_rows += 1;
                }
                continue;
            };
            if self.artifact_path_for(&key, level).is_file() {
                known.insert((key, level));
            } else {
                sqlx::query("DELETE FROM cache_metadata WHERE fingerprint = ?")
                    .bind(&key)
                    .execute(&self.pool)
                    .await?;
                report.dangling_rows += 1;
            }
        }

        for level in CacheLevel::ALL {
            let dir = self.root.join(level.dir_name());
            for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(dir = %dir.display(), error = %e, "failed to scan cache dir");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy();
                let claimed = name
                    .strip_suffix(".json")
                    .is_some_and(|stem| known.contains(&(stem.to_string(), level)));
                if claimed {
                    continue;
                }
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => report.orphan_artifacts += 1,
                    Err(e) => tracing::warn!(
                        path = %entry.path().display(),
                        error = %e,
                        "failed to delete orphan artifact"
                    ),
                }
            }
        }

        tracing::info!(
            orphan_artifacts = report.orphan_artifacts,
            dangling_rows = report.dangling_rows,
            "cache pruned"
        );
        Ok(report)
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn decode_envelope(
    bytes: &[u8],
    fingerprint: &Fingerprint,
    level: CacheLevel,
) -> Result<CachePayload, String> {
    let envelope: Envelope<CachePayload> =
        serde_json::from_slice(bytes).map_err(|e| format!("invalid artifact: {}", e))?;
    if &envelope.fingerprint != fingerprint {
        return Err(format!(
            "artifact belongs to {}",
            envelope.fingerprint.short()
        ));
    }
    if envelope.level != level || envelope.payload.level() != level {
        return Err(format!("artifact level is {}", envelope.level));
    }
    Ok(envelope.payload)
}

fn entry_from_row(row: &SqliteRow) -> Result<CacheEntry> {
    let key: String = row.try_get("fingerprint")?;
    let fingerprint = Fingerprint::parse(&key)
        .with_context(|| format!("invalid fingerprint in cache index: {}", key))?;
    let level_name: String = row.try_get("level")?;
    let level = CacheLevel::parse(&level_name)
        .with_context(|| format!("invalid level in cache index: {}", level_name))?;

    let scope = match level {
        CacheLevel::FullDocument => EntryScope::FullDocument,
        CacheLevel::Page => {
            let page_number: Option<i64> = row.try_get("page_number")?;
            let parent: Option<String> = row.try_get("parent_fingerprint")?;
            match (page_number, parent.as_deref().and_then(Fingerprint::parse)) {
                (Some(page_number), Some(parent)) => EntryScope::Page {
                    page_number: page_number as u32,
                    parent,
                },
                _ => bail!("page entry {} lacks page number or parent", key),
            }
        }
    };

    Ok(CacheEntry {
        fingerprint,
        scope,
        source_name: row.try_get("source_name")?,
        byte_size: row.try_get::<i64, _>("byte_size")? as u64,
        processing_time_secs: row.try_get("processing_time")?,
        content_char_length: row.try_get::<i64, _>("content_length")? as u64,
        created_at: row.try_get("created_at")?,
        last_accessed_at: row.try_get("last_accessed_at")?,
        access_count: row.try_get::<i64, _>("access_count")? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use texproof_core::{fingerprint, PageContent};

    fn page_payload(text: &str) -> CachePayload {
        CachePayload::Page(PageContent {
            page_number: 1,
            content: text.to_string(),
            source_file: "a_page_1.pdf".to_string(),
        })
    }

    #[test]
    fn test_decode_envelope_checks_identity() {
        let fp = fingerprint(b"a", None);
        let other = fingerprint(b"b", None);
        let payload = page_payload("x");
        let bytes = serde_json::to_vec(&Envelope {
            fingerprint: fp.clone(),
            level: CacheLevel::Page,
            source_name: "a.pdf".to_string(),
            cached_at: 0,
            payload: &payload,
        })
        .unwrap();

        assert_eq!(decode_envelope(&bytes, &fp, CacheLevel::Page).unwrap(), payload);
        assert!(decode_envelope(&bytes, &other, CacheLevel::Page).is_err());
        assert!(decode_envelope(&bytes, &fp, CacheLevel::FullDocument).is_err());
        assert!(decode_envelope(&bytes[..bytes.len() / 2], &fp, CacheLevel::Page).is_err());
    }

    #[tokio::test]
    async fn test_put_rejects_level_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(&CacheConfig::at(dir.path())).await.unwrap();
        let fp = fingerprint(b"doc", None);
        let ok = store
            .put(
                &fp,
                EntryScope::FullDocument,
                &page_payload("x"),
                EntryOrigin {
                    source_name: "a.pdf",
                    byte_size: 3,
                    processing_time_secs: 0.0,
                },
            )
            .await;
        assert!(!ok);
        assert!(!store.has(&fp, CacheLevel::FullDocument).await);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_not_present() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(&CacheConfig::at(dir.path())).await.unwrap();
        let parent = fingerprint(b"doc", None);
        let fp = fingerprint(b"page", Some("page_1"));
        assert!(
            store
                .put(
                    &fp,
                    EntryScope::Page {
                        page_number: 1,
                        parent,
                    },
                    &page_payload("hello"),
                    EntryOrigin {
                        source_name: "a.pdf",
                        byte_size: 4,
                        processing_time_secs: 0.5,
                    },
                )
                .await
        );
        std::fs::remove_file(store.artifact_path(&fp, CacheLevel::Page)).unwrap();
        assert!(!store.has(&fp, CacheLevel::Page).await);
        assert!(store.get(&fp, CacheLevel::Page).await.is_none());
        assert!(store.entry(&fp).await.unwrap().is_none());
    }
}
