//! Section-boundary splitting.

use std::sync::LazyLock;

use regex::Regex;

/// Marks the start of the document body; everything before it is preamble.
pub const DOCUMENT_START_MARKER: &str = r"\begin{document}";

static SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\\section\*?\s*\{[^}]*\}").unwrap());

/// Split on `\section{...}` markers.
///
/// Front matter up to `\begin{document}` is dropped. Each piece runs from
/// one section marker to the next; text between the body start and the
/// first marker is not emitted. Without any marker the whole (trimmed)
/// text is a single piece.
pub(crate) fn split(text: &str) -> Vec<String> {
    let body = match text.find(DOCUMENT_START_MARKER) {
        Some(start) => &text[start..],
        None => text,
    };

    let starts: Vec<usize> = SECTION.find_iter(body).map(|m| m.start()).collect();
    if starts.is_empty() {
        tracing::debug!("no section markers; returning body as one chunk");
        return vec![body.trim().to_string()];
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(body.len());
            body[start..end].to_string()
        })
        .collect()
}
