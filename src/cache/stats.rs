//! Session counters and aggregate cache reports.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use texproof_core::CacheLevel;

/// Process-lifetime hit/miss counters. Never persisted.
///
/// Every hit at either level stands in for exactly one external analysis
/// call, so `calls_avoided` equals the total hit count.
#[derive(Debug, Default)]
pub struct SessionStats {
    full_document_hits: AtomicU64,
    page_hits: AtomicU64,
    full_document_misses: AtomicU64,
    page_misses: AtomicU64,
}

impl SessionStats {
    pub fn record_hit(&self, level: CacheLevel) {
        let counter = match level {
            CacheLevel::FullDocument => &self.full_document_hits,
            CacheLevel::Page => &self.page_hits,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self, level: CacheLevel) {
        let counter = match level {
            CacheLevel::FullDocument => &self.full_document_misses,
            CacheLevel::Page => &self.page_misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let full_document_hits = self.full_document_hits.load(Ordering::Relaxed);
        let page_hits = self.page_hits.load(Ordering::Relaxed);
        let misses = self.full_document_misses.load(Ordering::Relaxed)
            + self.page_misses.load(Ordering::Relaxed);
        let hits = full_document_hits + page_hits;
        SessionSnapshot {
            hits,
            misses,
            full_document_hits,
            page_hits,
            calls_avoided: hits,
            hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub full_document_hits: u64,
    pub page_hits: u64,
    pub calls_avoided: u64,
    /// `hits / (hits + misses)`, 0 when nothing was looked up.
    pub hit_rate: f64,
}

/// Aggregates for one level, or for all levels combined.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelStats {
    pub entries: u64,
    pub total_bytes: u64,
    pub avg_processing_secs: f64,
    pub total_accesses: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub full_document: LevelStats,
    pub page: LevelStats,
    pub overall: LevelStats,
    pub session: SessionSnapshot,
}

impl CacheStats {
    pub fn level(&self, level: CacheLevel) -> &LevelStats {
        match level {
            CacheLevel::FullDocument => &self.full_document,
            CacheLevel::Page => &self.page,
        }
    }
}

/// Read-only optimisation hints.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendations {
    pub total_entries: u64,
    /// Entries read at most once.
    pub low_access_entries: u64,
    pub large_entries: u64,
    pub stale_entries: u64,
    pub advice: Vec<String>,
    pub session: SessionSnapshot,
}

impl Recommendations {
    pub(crate) fn advise(&mut self) {
        let mut advice = Vec::new();
        if self.low_access_entries as f64 > self.total_entries as f64 * 0.3 {
            advice.push("Many entries are rarely reused; schedule a periodic cleanup.".to_string());
        }
        if self.large_entries > 0 {
            advice.push(format!("{} large entries are cached.", self.large_entries));
        }
        if self.stale_entries > 0 {
            advice.push(format!(
                "Consider removing {} stale entries.",
                self.stale_entries
            ));
        }
        self.advice = advice;
    }
}
