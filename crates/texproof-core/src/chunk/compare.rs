//! Side-by-side mode comparison and mode recommendation.

use std::time::Instant;

use serde::Serialize;

use super::{ChunkError, SplitMode};
use crate::models::Chunk;

/// Summary of one mode's output on a given input.
#[derive(Debug, Clone, Serialize)]
pub struct ModeComparison {
    pub mode: SplitMode,
    pub chunk_count: usize,
    pub average_chars: f64,
    pub min_chars: usize,
    pub max_chars: usize,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub(super) fn measure<F>(mode: SplitMode, run: F) -> ModeComparison
where
    F: FnOnce() -> Result<Vec<Chunk>, ChunkError>,
{
    let start = Instant::now();
    let result = run();
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(chunks) => {
            let lens: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
            let total: usize = lens.iter().sum();
            ModeComparison {
                mode,
                chunk_count: chunks.len(),
                average_chars: if lens.is_empty() {
                    0.0
                } else {
                    total as f64 / lens.len() as f64
                },
                min_chars: lens.iter().copied().min().unwrap_or(0),
                max_chars: lens.iter().copied().max().unwrap_or(0),
                elapsed_ms,
                error: None,
            }
        }
        Err(e) => ModeComparison {
            mode,
            chunk_count: 0,
            average_chars: 0.0,
            min_chars: 0,
            max_chars: 0,
            elapsed_ms,
            error: Some(e.to_string()),
        },
    }
}

/// Suggest a mode from the input's character length.
///
/// Short inputs keep their section structure, mid-sized ones benefit from
/// the preamble/body split, and long ones are best cut into sentences.
pub fn recommend_mode(text: &str) -> SplitMode {
    match text.chars().count() {
        0..500 => SplitMode::Section,
        500..2000 => SplitMode::Hybrid,
        _ => SplitMode::Sentence,
    }
}
