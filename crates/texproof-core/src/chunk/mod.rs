//! Multi-strategy LaTeX chunking engine.
//!
//! One [`ChunkingEngine`] serves every splitting strategy, selected per call
//! by [`SplitMode`]:
//!
//! | Mode | Boundary rule |
//! |------|---------------|
//! | `section` | `\section{...}` markers in the document body |
//! | `command` | structural markup vs. prose, tiered overlap resolution |
//! | `sentence` | sentence boundaries, markup protected by placeholders |
//! | `hybrid` | `command` on the preamble, `sentence` on the body |
//! | `recursive` | length-bounded recursive split with overlap |
//!
//! # Pipeline
//!
//! 1. Decode the input ([`crate::text::decode`]); this never fails.
//! 2. Validate the trimmed length. Only `section` enforces the upper bound.
//! 3. Run the mode. A panic inside a mode is caught here and reported as
//!    [`ChunkError::Failed`].
//! 4. Clean every piece ([`crate::text::clean_chunk`]) and drop empties.
//! 5. If nothing survived, return the whole trimmed input as one chunk.
//!
//! ```rust
//! use texproof_core::chunk::{ChunkingConfig, ChunkingEngine, SplitMode};
//!
//! let engine = ChunkingEngine::new(ChunkingConfig::default());
//! let chunks = engine
//!     .split("\\section{Intro} Hello there. \\section{End} Bye.", SplitMode::Section)
//!     .unwrap();
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[1].ordinal, 1);
//! ```

mod command;
mod compare;
pub mod recursive;
mod section;
mod sentence;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::fingerprint::fingerprint;
use crate::models::Chunk;
use crate::text::{clean_chunk, validate_length, SourceText};

pub use compare::{recommend_mode, ModeComparison};
pub use section::DOCUMENT_START_MARKER;

/// Default maximum characters per chunk for `recursive`.
pub const DEFAULT_CHUNK_SIZE: usize = 2000;
/// Default characters shared between consecutive `recursive` chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
/// Inputs shorter than this are rejected as meaningless.
pub const MIN_CHARS: usize = 10;
/// Inputs longer than this are rejected by modes that enforce a maximum.
pub const MAX_CHARS: usize = 10_000;

/// Chunking failures. Callers never see raw parser errors.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("text is empty")]
    Empty,
    #[error("text is too short ({len} chars, minimum {min})")]
    TooShort { len: usize, min: usize },
    #[error("text is too long ({len} chars, maximum {max})")]
    TooLong { len: usize, max: usize },
    #[error("unsupported chunking mode: '{0}'. Must be section, command, sentence, hybrid, or recursive.")]
    UnsupportedMode(String),
    #[error("{mode} chunking failed: {reason}")]
    Failed { mode: SplitMode, reason: String },
}

/// Splitting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    Section,
    Command,
    Sentence,
    Hybrid,
    Recursive,
}

impl SplitMode {
    pub const ALL: [SplitMode; 5] = [
        SplitMode::Section,
        SplitMode::Command,
        SplitMode::Sentence,
        SplitMode::Hybrid,
        SplitMode::Recursive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SplitMode::Section => "section",
            SplitMode::Command => "command",
            SplitMode::Sentence => "sentence",
            SplitMode::Hybrid => "hybrid",
            SplitMode::Recursive => "recursive",
        }
    }

    /// Whether the mode rejects inputs above the maximum length.
    pub fn enforces_max_length(&self) -> bool {
        matches!(self, SplitMode::Section)
    }
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitMode {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "section" => Ok(SplitMode::Section),
            "command" => Ok(SplitMode::Command),
            "sentence" => Ok(SplitMode::Sentence),
            "hybrid" => Ok(SplitMode::Hybrid),
            "recursive" | "recursive_nlp" => Ok(SplitMode::Recursive),
            other => Err(ChunkError::UnsupportedMode(other.to_string())),
        }
    }
}

/// Display classification of a produced chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Preamble,
    DocumentStart,
    SectionHeader,
    Content,
    LatexCommand,
    TextContent,
    Sentence,
    Chunk,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Preamble => "preamble",
            ChunkKind::DocumentStart => "document_start",
            ChunkKind::SectionHeader => "section_header",
            ChunkKind::Content => "content",
            ChunkKind::LatexCommand => "latex_command",
            ChunkKind::TextContent => "text_content",
            ChunkKind::Sentence => "sentence",
            ChunkKind::Chunk => "chunk",
        }
    }
}

/// Size and validation limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum characters per `recursive` chunk.
    pub chunk_size: usize,
    /// Characters shared between consecutive `recursive` chunks.
    pub chunk_overlap: usize,
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            min_chars: MIN_CHARS,
            max_chars: MAX_CHARS,
        }
    }
}

/// A named LaTeX source for batch chunking.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content: Vec<u8>,
}

/// Chunks of one source file.
#[derive(Debug, Clone, Serialize)]
pub struct FileChunks {
    pub name: String,
    pub total_chunks: usize,
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, Default)]
pub struct ChunkingEngine {
    config: ChunkingConfig,
}

impl ChunkingEngine {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split `input` with `mode`. Never returns an empty sequence on success.
    pub fn split<'a>(
        &self,
        input: impl Into<SourceText<'a>>,
        mode: SplitMode,
    ) -> Result<Vec<Chunk>, ChunkError> {
        self.split_named(input, mode, None)
    }

    /// Like [`split`](Self::split), tagging every chunk with its source name.
    pub fn split_named<'a>(
        &self,
        input: impl Into<SourceText<'a>>,
        mode: SplitMode,
        source_name: Option<&str>,
    ) -> Result<Vec<Chunk>, ChunkError> {
        let source: SourceText<'a> = input.into();
        let decoded = source.decode();
        if decoded.lossy {
            tracing::warn!(source = ?source_name, "input decoded with replacement characters");
        }
        let text: &str = &decoded.text;

        let max = mode
            .enforces_max_length()
            .then_some(self.config.max_chars);
        validate_length(text, self.config.min_chars, max)?;

        tracing::debug!(%mode, chars = text.len(), "chunking started");

        let raw = panic::catch_unwind(AssertUnwindSafe(|| self.run_mode(text, mode)))
            .map_err(|payload| ChunkError::Failed {
                mode,
                reason: panic_message(payload.as_ref()),
            })?;

        let mut pieces: Vec<String> = raw
            .iter()
            .map(|p| clean_chunk(p))
            .filter(|p| !p.is_empty())
            .collect();
        if pieces.is_empty() {
            pieces.push(text.trim().to_string());
        }

        tracing::debug!(%mode, chunks = pieces.len(), "chunking finished");

        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| make_chunk(ordinal, text, source_name))
            .collect())
    }

    /// Chunk several files with one mode. A file that fails aborts the batch.
    pub fn split_files(
        &self,
        files: &[SourceFile],
        mode: SplitMode,
    ) -> Result<Vec<FileChunks>, ChunkError> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            let chunks = self.split_named(&file.content, mode, Some(file.name.as_str()))?;
            tracing::debug!(file = %file.name, chunks = chunks.len(), "file chunked");
            results.push(FileChunks {
                name: file.name.clone(),
                total_chunks: chunks.len(),
                chunks,
            });
        }
        let total: usize = results.iter().map(|r| r.total_chunks).sum();
        tracing::info!(files = files.len(), chunks = total, %mode, "batch chunking finished");
        Ok(results)
    }

    /// Run several modes on one input and summarize each.
    pub fn compare<'a>(
        &self,
        input: impl Into<SourceText<'a>>,
        modes: &[SplitMode],
    ) -> Vec<ModeComparison> {
        let input: SourceText<'a> = input.into();
        modes
            .iter()
            .map(|&mode| compare::measure(mode, || self.split(input, mode)))
            .collect()
    }

    fn run_mode(&self, text: &str, mode: SplitMode) -> Vec<String> {
        match mode {
            SplitMode::Section => section::split(text),
            SplitMode::Command => command::split(text),
            SplitMode::Sentence => sentence::split(text),
            SplitMode::Hybrid => hybrid_split(text),
            SplitMode::Recursive => recursive::RecursiveSplitter::new(
                self.config.chunk_size,
                self.config.chunk_overlap,
                recursive::DEFAULT_SEPARATORS,
            )
            .split(text),
        }
    }
}

/// `command` on the preamble, `sentence` on the body, in that order.
fn hybrid_split(text: &str) -> Vec<String> {
    let (preamble, body) = match text.find(DOCUMENT_START_MARKER) {
        Some(start) => (text[..start].trim(), text[start..].trim()),
        None => (text.trim(), ""),
    };

    let mut pieces = Vec::new();
    if !preamble.is_empty() {
        pieces.extend(command::split(preamble));
    }
    if !body.is_empty() {
        pieces.extend(sentence::split(body));
    }
    pieces
}

/// Classify a chunk for display, following the rules of the mode it came from.
pub fn chunk_kind(text: &str, mode: SplitMode) -> ChunkKind {
    let lower = text.trim().to_lowercase();
    match mode {
        SplitMode::Hybrid => {
            if ["\\documentclass", "\\usepackage", "\\title", "\\author"]
                .iter()
                .any(|cmd| lower.contains(cmd))
            {
                ChunkKind::Preamble
            } else if lower.contains("\\begin{document}") {
                ChunkKind::DocumentStart
            } else if ["\\section", "\\subsection", "\\chapter"]
                .iter()
                .any(|sec| lower.contains(sec))
            {
                ChunkKind::SectionHeader
            } else {
                ChunkKind::Content
            }
        }
        SplitMode::Command => {
            if lower.starts_with('\\') {
                ChunkKind::LatexCommand
            } else {
                ChunkKind::TextContent
            }
        }
        SplitMode::Sentence => ChunkKind::Sentence,
        SplitMode::Section | SplitMode::Recursive => ChunkKind::Chunk,
    }
}

fn make_chunk(ordinal: usize, text: String, source_name: Option<&str>) -> Chunk {
    Chunk {
        ordinal,
        hash: fingerprint(text.as_bytes(), None).to_string(),
        text,
        source_document_name: source_name.map(str::to_string),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
