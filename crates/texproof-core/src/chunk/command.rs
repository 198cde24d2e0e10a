//! Markup-command splitting.
//!
//! Structural LaTeX elements become their own chunks and the prose between
//! them becomes separate chunks. Patterns are tiered by specificity; when
//! matches from different tiers overlap, the most specific tier wins and
//! every overlapping lower-tier match is discarded.

use std::sync::LazyLock;

use regex::Regex;

/// Pattern tiers, most specific first.
static TIERS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"\\documentclass(?:\[[^\]]*\])?\{[^}]*\}").unwrap(),
        Regex::new(r"\\usepackage(?:\[[^\]]*\])?\{[^}]*\}").unwrap(),
        Regex::new(r"(?s)\\begin\{[^}]+\}.*?\\end\{[^}]+\}").unwrap(),
        Regex::new(r"\\[a-zA-Z*]+(?:\[[^\]]*\])?(?:\{[^{}]*\})*").unwrap(),
    ]
});

/// A structural match: byte span plus the tier it came from (0 = highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub tier: usize,
    pub start: usize,
    pub end: usize,
}

impl Span {
    fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Collect matches of every tier and keep a non-overlapping subset where a
/// higher tier always beats a lower one. Returned spans are in text order.
pub(crate) fn resolve_spans(text: &str) -> Vec<Span> {
    let mut candidates: Vec<Span> = TIERS
        .iter()
        .enumerate()
        .flat_map(|(tier, re)| {
            re.find_iter(text).map(move |m| Span {
                tier,
                start: m.start(),
                end: m.end(),
            })
        })
        .collect();

    // Best tier first, then leftmost, then longest.
    candidates.sort_by_key(|s| (s.tier, s.start, std::cmp::Reverse(s.end)));

    let mut kept: Vec<Span> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !kept.iter().any(|k| k.overlaps(&candidate)) {
            kept.push(candidate);
        }
    }
    kept.sort_by_key(|s| s.start);
    kept
}

/// Alternate structural elements and the prose between them.
pub(crate) fn split(text: &str) -> Vec<String> {
    let spans = resolve_spans(text);
    let mut pieces = Vec::with_capacity(spans.len() * 2 + 1);
    let mut cursor = 0;

    for span in &spans {
        let before = text[cursor..span.start].trim();
        if !before.is_empty() {
            pieces.push(before.to_string());
        }
        pieces.push(text[span.start..span.end].to_string());
        cursor = span.end;
    }

    let rest = text[cursor..].trim();
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}
