//! # texproof
//!
//! Cached document analysis and LaTeX chunking for knowledge-driven paper
//! proofreading.
//!
//! Analysing a PDF with a remote layout service is slow and billed per
//! page. texproof keeps every result in a two-level, content-addressed
//! cache (whole documents and single pages), so an identical document is
//! answered from one lookup and a revised document only pays for the pages
//! that changed. LaTeX sources skip analysis and go straight to the
//! chunking engine in [`texproof_core`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────────────┐
//! │   PDF    │──▶│ Orchestrator │──▶│ CacheStore         │
//! └──────────┘   │  split pages │   │ SQLite index +     │
//!                │  lookup/fill │   │ JSON artifacts     │
//!                └──────┬───────┘   └────────────────────┘
//!                       ▼
//!                ┌──────────────┐
//!                │ Analyzer     │  azure / local / fake
//!                └──────────────┘
//!
//! ┌──────────┐   ┌──────────────┐
//! │  .tex    │──▶│ChunkingEngine│──▶ chunks
//! └──────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Metadata index connection |
//! | [`migrate`] | Schema migrations |
//! | [`cache`] | Two-level cache store and whole-document view |
//! | [`page_split`] | PDF page decomposition |
//! | [`analysis`] | Document-analysis service backends |
//! | [`orchestrator`] | Cache-aware analysis pipeline |

pub mod analysis;
pub mod analyze_cmd;
pub mod cache;
pub mod cache_cmd;
pub mod chunk_cmd;
pub mod config;
pub mod db;
pub mod logging;
pub mod migrate;
pub mod orchestrator;
pub mod page_split;

pub use texproof_core::{
    chunk, fingerprint, models, text, Chunk, ChunkError, ChunkingEngine, Fingerprint,
    PageContent, PageUnit, SplitMode,
};
