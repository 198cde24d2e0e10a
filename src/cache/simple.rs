//! Whole-document cache.
//!
//! The single-level variant of the cache: one entry per document, keyed by
//! the document's bytes, no page entries. It shares the metadata index and
//! the `full_documents/` directory with [`CacheStore`], so both variants see
//! the same whole-document entries.

use std::sync::Arc;

use anyhow::Result;
use texproof_core::{fingerprint, CacheEntry, CacheLevel, CachePayload, EntryScope, Fingerprint, PageContent};

use super::store::{CacheStore, EntryOrigin};

#[derive(Clone)]
pub struct WholeDocumentCache {
    store: Arc<CacheStore>,
}

impl WholeDocumentCache {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    pub fn key(document: &[u8]) -> Fingerprint {
        fingerprint(document, None)
    }

    pub async fn has(&self, document: &[u8]) -> bool {
        self.store
            .has(&Self::key(document), CacheLevel::FullDocument)
            .await
    }

    pub async fn get(&self, document: &[u8]) -> Option<Vec<PageContent>> {
        match self
            .store
            .get(&Self::key(document), CacheLevel::FullDocument)
            .await?
        {
            CachePayload::Document(pages) => Some(pages),
            CachePayload::Page(_) => None,
        }
    }

    pub async fn put(
        &self,
        document: &[u8],
        source_name: &str,
        pages: &[PageContent],
        processing_time_secs: f64,
    ) -> bool {
        self.store
            .put(
                &Self::key(document),
                EntryScope::FullDocument,
                &CachePayload::Document(pages.to_vec()),
                EntryOrigin {
                    source_name,
                    byte_size: document.len() as u64,
                    processing_time_secs,
                },
            )
            .await
    }

    /// Remove documents cached more than `days` days ago, regardless of use.
    pub async fn cleanup_older_than(&self, days: u32) -> Result<usize> {
        self.store
            .cleanup_created_before(CacheLevel::FullDocument, days)
            .await
    }

    /// Cached documents, newest first.
    pub async fn list(&self) -> Result<Vec<CacheEntry>> {
        self.store.list(Some(CacheLevel::FullDocument)).await
    }
}
