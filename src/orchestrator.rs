//! Cache-aware document analysis.
//!
//! [`DocumentAnalysisOrchestrator::analyze`] answers from the cheapest
//! source available:
//!
//! 1. a whole-document cache hit returns every page at once;
//! 2. otherwise the document is split and each page is looked up in the
//!    page cache;
//! 3. only pages that miss are sent to the analysis service, and their
//!    non-empty results are written back to the page cache;
//! 4. the assembled page list is cached as a whole document.
//!
//! A page whose analysis fails is logged and left out of the result. A page
//! with no extracted text is left out and never cached.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use texproof_core::{
    fingerprint, page_prefix, CacheLevel, CachePayload, EntryScope, Fingerprint, PageContent,
};

use crate::analysis::{AnalysisError, AnalysisOutput, DocumentAnalyzer};
use crate::cache::{CacheStore, EntryOrigin, WholeDocumentCache};
use crate::page_split::PageSplitter;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("no text could be extracted from {0}")]
    NothingExtracted(String),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Outcome of analysing one document.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub source_name: String,
    pub fingerprint: Fingerprint,
    pub pages: Vec<PageContent>,
    pub full_document_hit: bool,
    pub page_hits: usize,
    pub external_calls: usize,
    /// Pages dropped because the analysis call failed.
    pub failed_pages: usize,
    pub elapsed_secs: f64,
}

/// A named input document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

pub struct DocumentAnalysisOrchestrator {
    store: Arc<CacheStore>,
    splitter: Arc<dyn PageSplitter>,
    analyzer: Arc<dyn DocumentAnalyzer>,
}

impl DocumentAnalysisOrchestrator {
    pub fn new(
        store: Arc<CacheStore>,
        splitter: Arc<dyn PageSplitter>,
        analyzer: Arc<dyn DocumentAnalyzer>,
    ) -> Self {
        Self {
            store,
            splitter,
            analyzer,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Two-level analysis: whole-document cache, then page cache, then the
    /// external service for each missing page.
    pub async fn analyze(
        &self,
        document: &[u8],
        source_name: &str,
    ) -> Result<AnalysisReport, AnalyzeError> {
        let started = Instant::now();
        let doc_fp = fingerprint(document, None);

        if let Some(CachePayload::Document(pages)) =
            self.store.get(&doc_fp, CacheLevel::FullDocument).await
        {
            self.store.record_hit(CacheLevel::FullDocument);
            tracing::info!(source = source_name, pages = pages.len(), "full-document cache hit");
            return Ok(AnalysisReport {
                source_name: source_name.to_string(),
                fingerprint: doc_fp,
                pages,
                full_document_hit: true,
                page_hits: 0,
                external_calls: 0,
                failed_pages: 0,
                elapsed_secs: started.elapsed().as_secs_f64(),
            });
        }
        self.store.record_miss(CacheLevel::FullDocument);

        let units = self.splitter.split(document, source_name);
        let mut pages = Vec::with_capacity(units.len());
        let mut page_hits = 0;
        let mut external_calls = 0;
        let mut failed_pages = 0;

        for unit in &units {
            let page_fp = fingerprint(&unit.bytes, Some(&page_prefix(unit.page_number)));

            if let Some(CachePayload::Page(mut page)) =
                self.store.get(&page_fp, CacheLevel::Page).await
            {
                self.store.record_hit(CacheLevel::Page);
                tracing::debug!(source = source_name, page = unit.page_number, "page cache hit");
                page_hits += 1;
                // The same page may have been cached from another document.
                page.source_file = source_name.to_string();
                pages.push(page);
                continue;
            }
            self.store.record_miss(CacheLevel::Page);

            external_calls += 1;
            let call_started = Instant::now();
            let output = match self.analyzer.analyze(&unit.bytes, &unit.page_file_name).await {
                Ok(output) => output,
                Err(e) => {
                    failed_pages += 1;
                    tracing::warn!(
                        source = source_name,
                        page = unit.page_number,
                        transient = e.is_transient(),
                        error = %e,
                        "page analysis failed; skipping page"
                    );
                    continue;
                }
            };

            let content = output.content.trim();
            if content.is_empty() {
                tracing::debug!(source = source_name, page = unit.page_number, "page has no text");
                continue;
            }

            let page = PageContent {
                page_number: unit.page_number,
                content: content.to_string(),
                source_file: source_name.to_string(),
            };
            self.store
                .put(
                    &page_fp,
                    EntryScope::Page {
                        page_number: unit.page_number,
                        parent: doc_fp.clone(),
                    },
                    &CachePayload::Page(page.clone()),
                    EntryOrigin {
                        source_name: &unit.page_file_name,
                        byte_size: unit.bytes.len() as u64,
                        processing_time_secs: call_started.elapsed().as_secs_f64(),
                    },
                )
                .await;
            pages.push(page);
        }

        if pages.is_empty() {
            return Err(AnalyzeError::NothingExtracted(source_name.to_string()));
        }

        // A failed page would be missing from every future whole-document hit.
        if failed_pages == 0 {
            self.store
                .put(
                    &doc_fp,
                    EntryScope::FullDocument,
                    &CachePayload::Document(pages.clone()),
                    EntryOrigin {
                        source_name,
                        byte_size: document.len() as u64,
                        processing_time_secs: started.elapsed().as_secs_f64(),
                    },
                )
                .await;
        } else {
            tracing::warn!(
                source = source_name,
                failed_pages,
                "not caching incomplete document"
            );
        }

        let report = AnalysisReport {
            source_name: source_name.to_string(),
            fingerprint: doc_fp,
            pages,
            full_document_hit: false,
            page_hits,
            external_calls,
            failed_pages,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        tracing::info!(
            source = source_name,
            pages = report.pages.len(),
            page_hits,
            external_calls,
            failed_pages,
            "document analysed"
        );
        Ok(report)
    }

    /// Whole-document cache only: one service call for the unsplit document,
    /// using the service's own page segmentation.
    pub async fn analyze_whole(
        &self,
        document: &[u8],
        source_name: &str,
    ) -> Result<AnalysisReport, AnalyzeError> {
        let started = Instant::now();
        let cache = WholeDocumentCache::new(self.store.clone());
        let doc_fp = WholeDocumentCache::key(document);

        if let Some(pages) = cache.get(document).await {
            self.store.record_hit(CacheLevel::FullDocument);
            tracing::info!(source = source_name, pages = pages.len(), "full-document cache hit");
            return Ok(AnalysisReport {
                source_name: source_name.to_string(),
                fingerprint: doc_fp,
                pages,
                full_document_hit: true,
                page_hits: 0,
                external_calls: 0,
                failed_pages: 0,
                elapsed_secs: started.elapsed().as_secs_f64(),
            });
        }
        self.store.record_miss(CacheLevel::FullDocument);

        let output = self.analyzer.analyze(document, source_name).await?;
        let pages = pages_from_output(output, source_name);
        if pages.is_empty() {
            return Err(AnalyzeError::NothingExtracted(source_name.to_string()));
        }

        cache
            .put(document, source_name, &pages, started.elapsed().as_secs_f64())
            .await;

        tracing::info!(source = source_name, pages = pages.len(), "document analysed whole");
        Ok(AnalysisReport {
            source_name: source_name.to_string(),
            fingerprint: doc_fp,
            pages,
            full_document_hit: false,
            page_hits: 0,
            external_calls: 1,
            failed_pages: 0,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }

    /// Analyse documents one after another. One failed document does not
    /// stop the rest.
    pub async fn analyze_batch(
        &self,
        documents: &[SourceDocument],
        legacy: bool,
    ) -> Vec<Result<AnalysisReport, AnalyzeError>> {
        let mut results = Vec::with_capacity(documents.len());
        for doc in documents {
            let result = if legacy {
                self.analyze_whole(&doc.bytes, &doc.name).await
            } else {
                self.analyze(&doc.bytes, &doc.name).await
            };
            if let Err(e) = &result {
                tracing::warn!(source = %doc.name, error = %e, "document skipped");
            }
            results.push(result);
        }

        let session = self.store.session();
        tracing::info!(
            documents = documents.len(),
            hits = session.hits,
            misses = session.misses,
            calls_avoided = session.calls_avoided,
            "batch finished"
        );
        results
    }
}

/// Pages as segmented by the service; the full content becomes page 1 when
/// the service returned no segmentation.
fn pages_from_output(output: AnalysisOutput, source_name: &str) -> Vec<PageContent> {
    let mut pages: Vec<PageContent> = output
        .pages
        .into_iter()
        .filter_map(|p| {
            let content = p.text.trim();
            (!content.is_empty()).then(|| PageContent {
                page_number: p.page_number,
                content: content.to_string(),
                source_file: source_name.to_string(),
            })
        })
        .collect();

    if pages.is_empty() && !output.content.trim().is_empty() {
        pages.push(PageContent {
            page_number: 1,
            content: output.content.trim().to_string(),
            source_file: source_name.to_string(),
        });
    }
    pages
}
