//! # texproof core
//!
//! Shared, I/O-free logic for texproof: content fingerprints, data models,
//! text normalization, and the multi-strategy LaTeX chunking engine.
//!
//! This crate contains no tokio, sqlx, filesystem, or network code. The
//! root `texproof` crate builds the persistent two-level analysis cache and
//! the page-decomposition pipeline on top of it.

pub mod chunk;
pub mod fingerprint;
pub mod models;
pub mod text;

pub use chunk::{
    chunk_kind, recommend_mode, ChunkError, ChunkKind, ChunkingConfig, ChunkingEngine, FileChunks,
    ModeComparison, SourceFile, SplitMode,
};
pub use fingerprint::{fingerprint, page_prefix, Fingerprint};
pub use models::{
    CacheEntry, CacheLevel, CachePayload, Chunk, EntryScope, PageContent, PageUnit,
};
pub use text::SourceText;
