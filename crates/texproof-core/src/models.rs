//! Core data models shared by the cache, the page pipeline, and the chunker.

use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// Which cache namespace an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLevel {
    /// One entry per whole multi-page document.
    FullDocument,
    /// One entry per single page of a document.
    Page,
}

impl CacheLevel {
    pub const ALL: [CacheLevel; 2] = [CacheLevel::FullDocument, CacheLevel::Page];

    /// Stable identifier stored in the metadata index.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLevel::FullDocument => "full_document",
            CacheLevel::Page => "page",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full_document" | "full" | "document" => Some(CacheLevel::FullDocument),
            "page" | "individual_page" => Some(CacheLevel::Page),
            _ => None,
        }
    }

    /// Sub-directory holding this level's content artifacts.
    pub fn dir_name(&self) -> &'static str {
        match self {
            CacheLevel::FullDocument => "full_documents",
            CacheLevel::Page => "pages",
        }
    }
}

impl std::fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level-specific identity of a cache entry.
///
/// Page entries always carry their page number and the fingerprint of the
/// document they were cut from; whole-document entries never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryScope {
    FullDocument,
    Page {
        page_number: u32,
        parent: Fingerprint,
    },
}

impl EntryScope {
    pub fn level(&self) -> CacheLevel {
        match self {
            EntryScope::FullDocument => CacheLevel::FullDocument,
            EntryScope::Page { .. } => CacheLevel::Page,
        }
    }

    pub fn page_number(&self) -> Option<u32> {
        match self {
            EntryScope::Page { page_number, .. } => Some(*page_number),
            EntryScope::FullDocument => None,
        }
    }

    pub fn parent(&self) -> Option<&Fingerprint> {
        match self {
            EntryScope::Page { parent, .. } => Some(parent),
            EntryScope::FullDocument => None,
        }
    }
}

/// Metadata row for one cached analysis result.
///
/// The payload itself lives in a content artifact next to the index; only
/// `last_accessed_at` and `access_count` ever change after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub scope: EntryScope,
    /// Original file name, for display only.
    pub source_name: String,
    /// Size of the analysed input in bytes.
    pub byte_size: u64,
    pub processing_time_secs: f64,
    /// Character length of the serialized payload.
    pub content_char_length: u64,
    /// Unix seconds.
    pub created_at: i64,
    /// Unix seconds.
    pub last_accessed_at: i64,
    pub access_count: u64,
}

impl CacheEntry {
    pub fn level(&self) -> CacheLevel {
        self.scope.level()
    }
}

/// Extracted text of one page, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    pub page_number: u32,
    pub content: String,
    pub source_file: String,
}

/// The immutable body of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CachePayload {
    Page(PageContent),
    Document(Vec<PageContent>),
}

impl CachePayload {
    pub fn level(&self) -> CacheLevel {
        match self {
            CachePayload::Page(_) => CacheLevel::Page,
            CachePayload::Document(_) => CacheLevel::FullDocument,
        }
    }
}

/// A single-page slice of a source document. Never persisted.
#[derive(Debug, Clone)]
pub struct PageUnit {
    /// 1-based position in the source document.
    pub page_number: u32,
    pub bytes: Vec<u8>,
    pub source_file_name: String,
    /// e.g. `paper_page_3.pdf`
    pub page_file_name: String,
}

/// A chunk of LaTeX source produced by the chunking engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position in the output sequence, contiguous from 0.
    pub ordinal: usize,
    pub text: String,
    /// Fingerprint of `text`, for deduplication downstream.
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_document_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    #[test]
    fn test_level_round_trip() {
        for level in CacheLevel::ALL {
            assert_eq!(CacheLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(CacheLevel::parse("individual_page"), Some(CacheLevel::Page));
        assert_eq!(CacheLevel::parse("bogus"), None);
    }

    #[test]
    fn test_scope_accessors() {
        let parent = fingerprint(b"doc", None);
        let scope = EntryScope::Page {
            page_number: 2,
            parent: parent.clone(),
        };
        assert_eq!(scope.level(), CacheLevel::Page);
        assert_eq!(scope.page_number(), Some(2));
        assert_eq!(scope.parent(), Some(&parent));
        assert_eq!(EntryScope::FullDocument.page_number(), None);
        assert!(EntryScope::FullDocument.parent().is_none());
    }

    #[test]
    fn test_payload_json_shape() {
        let payload = CachePayload::Page(PageContent {
            page_number: 1,
            content: "Intro".into(),
            source_file: "a.pdf".into(),
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "page");
        assert_eq!(json["data"]["content"], "Intro");
        let back: CachePayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.level(), CacheLevel::Page);
    }
}
