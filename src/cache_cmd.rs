//! `texproof cache ...`: inspect and maintain the analysis cache.

use anyhow::Result;
use texproof_core::{CacheEntry, CacheLevel};

use crate::cache::{CacheStore, CleanupCriteria, LevelStats};
use crate::config::Config;

pub async fn run_stats(config: &Config) -> Result<()> {
    let store = CacheStore::open(&config.cache).await?;
    let stats = store.stats().await?;

    println!("texproof: cache stats");
    println!("=====================");
    println!();
    println!("  Cache dir:   {}", config.cache.dir.display());
    println!();
    println!(
        "  {:<16} {:>8} {:>10} {:>10} {:>9}",
        "LEVEL", "ENTRIES", "SIZE", "AVG TIME", "ACCESSES"
    );
    println!("  {}", "-".repeat(57));
    print_level_row("full_document", &stats.full_document);
    print_level_row("page", &stats.page);
    print_level_row("total", &stats.overall);
    println!();

    store.close().await;
    Ok(())
}

fn print_level_row(name: &str, stats: &LevelStats) {
    println!(
        "  {:<16} {:>8} {:>10} {:>9.2}s {:>9}",
        name,
        stats.entries,
        human_size(stats.total_bytes),
        stats.avg_processing_secs,
        stats.total_accesses
    );
}

pub async fn run_recommend(config: &Config) -> Result<()> {
    let store = CacheStore::open(&config.cache).await?;
    let report = store.recommendations().await?;

    println!("  Entries:        {}", report.total_entries);
    println!("  Rarely used:    {}", report.low_access_entries);
    println!(
        "  Large (> {}): {}",
        human_size(config.cache.large_entry_bytes),
        report.large_entries
    );
    println!(
        "  Stale (> {} days): {}",
        config.cache.stale_after_days, report.stale_entries
    );
    println!();
    if report.advice.is_empty() {
        println!("  No action needed.");
    } else {
        for line in &report.advice {
            println!("  - {}", line);
        }
    }

    store.close().await;
    Ok(())
}

pub async fn run_list(config: &Config, level: Option<&str>) -> Result<()> {
    let level = level
        .map(|l| {
            CacheLevel::parse(l)
                .ok_or_else(|| anyhow::anyhow!("Unknown cache level: '{}'. Must be full_document or page.", l))
        })
        .transpose()?;

    let store = CacheStore::open(&config.cache).await?;
    let entries = store.list(level).await?;

    if entries.is_empty() {
        println!("No cached entries.");
    } else {
        println!(
            "  {:<10} {:<14} {:>5} {:>10} {:>7}  {:<10} {}",
            "KEY", "LEVEL", "PAGE", "SIZE", "HITS", "AGE", "SOURCE"
        );
        println!("  {}", "-".repeat(80));
        let now = chrono::Utc::now().timestamp();
        for entry in &entries {
            print_entry(entry, now);
        }
    }

    store.close().await;
    Ok(())
}

fn print_entry(entry: &CacheEntry, now: i64) {
    let page = entry
        .scope
        .page_number()
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {:<10} {:<14} {:>5} {:>10} {:>7}  {:<10} {}",
        entry.fingerprint.short(),
        entry.level().as_str(),
        page,
        human_size(entry.byte_size),
        entry.access_count,
        entry_age(entry.created_at, now),
        entry.source_name
    );
}

pub async fn run_cleanup(
    config: &Config,
    days: u32,
    min_access: u64,
    max_size_mb: Option<f64>,
) -> Result<()> {
    if let Some(mb) = max_size_mb {
        if mb <= 0.0 {
            anyhow::bail!("--max-size-mb must be > 0");
        }
    }
    let criteria = CleanupCriteria {
        older_than_days: days,
        min_access_count: min_access,
        max_size_bytes: max_size_mb.map(|mb| (mb * 1024.0 * 1024.0) as u64),
    };

    let store = CacheStore::open(&config.cache).await?;
    let removed = store.cleanup(criteria).await?;
    println!("Removed {} cache entries.", removed);

    store.close().await;
    Ok(())
}

pub async fn run_prune(config: &Config) -> Result<()> {
    let store = CacheStore::open(&config.cache).await?;
    let report = store.prune_orphans().await?;
    println!(
        "Pruned {} orphan artifacts and {} dangling index rows.",
        report.orphan_artifacts, report.dangling_rows
    );

    store.close().await;
    Ok(())
}

const SIZE_UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

/// Byte count scaled to the largest unit that keeps the value at or above one.
fn human_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < SIZE_UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, SIZE_UNITS[0])
    } else {
        format!("{:.1} {}", value, SIZE_UNITS[unit])
    }
}

/// Compact age of a Unix timestamp relative to `now`: `42s`, `3h`, `12d`.
/// Future timestamps and anything past a year print as a date.
fn entry_age(ts: i64, now: i64) -> String {
    const STEPS: [(i64, &str); 3] = [(60, "s"), (3600, "m"), (86_400, "h")];
    let age = now - ts;
    if (0..86_400 * 365).contains(&age) {
        let mut divisor = 1;
        for (limit, suffix) in STEPS {
            if age < limit {
                return format!("{}{}", age / divisor, suffix);
            }
            divisor = limit;
        }
        return format!("{}d", age / 86_400);
    }
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.date_naive().to_string())
        .unwrap_or_else(|| ts.to_string())
}
