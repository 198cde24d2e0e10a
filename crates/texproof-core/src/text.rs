//! Text normalization shared by every chunking strategy.
//!
//! Raw LaTeX uploads arrive as bytes in whatever encoding the author's
//! editor used. [`decode`] walks a fixed fallback chain and never fails;
//! [`validate_length`] rejects inputs that are too short to be meaningful
//! or too long to be sane; [`clean_chunk`] normalizes chunk whitespace.

use std::borrow::Cow;
use std::sync::LazyLock;

use encoding_rs::{Encoding, EUC_JP, SHIFT_JIS};
use regex::Regex;

use crate::chunk::ChunkError;

/// Two or more blank lines (possibly containing spaces).
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n+").unwrap());

const UTF8_BOM: char = '\u{feff}';

/// Input accepted by the chunking engine: already-decoded text or raw bytes.
#[derive(Debug, Clone, Copy)]
pub enum SourceText<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
}

impl<'a> From<&'a str> for SourceText<'a> {
    fn from(s: &'a str) -> Self {
        SourceText::Text(s)
    }
}

impl<'a> From<&'a String> for SourceText<'a> {
    fn from(s: &'a String) -> Self {
        SourceText::Text(s.as_str())
    }
}

impl<'a> From<&'a [u8]> for SourceText<'a> {
    fn from(b: &'a [u8]) -> Self {
        SourceText::Bytes(b)
    }
}

impl<'a> From<&'a Vec<u8>> for SourceText<'a> {
    fn from(b: &'a Vec<u8>) -> Self {
        SourceText::Bytes(b.as_slice())
    }
}

/// Result of decoding raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<'a> {
    pub text: Cow<'a, str>,
    /// Label of the encoding that succeeded.
    pub encoding: &'static str,
    /// True when the last-resort replacement decode was used.
    pub lossy: bool,
}

impl<'a> SourceText<'a> {
    pub fn decode(self) -> Decoded<'a> {
        match self {
            SourceText::Text(s) => Decoded {
                text: Cow::Borrowed(s),
                encoding: "utf-8",
                lossy: false,
            },
            SourceText::Bytes(b) => decode(b),
        }
    }
}

/// Decode bytes: UTF-8, UTF-8 with BOM, Shift_JIS (CP932), EUC-JP, then
/// UTF-8 with replacement characters.
pub fn decode(bytes: &[u8]) -> Decoded<'_> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return match s.strip_prefix(UTF8_BOM) {
            Some(rest) => Decoded {
                text: Cow::Borrowed(rest),
                encoding: "utf-8-sig",
                lossy: false,
            },
            None => Decoded {
                text: Cow::Borrowed(s),
                encoding: "utf-8",
                lossy: false,
            },
        };
    }

    for encoding in [SHIFT_JIS, EUC_JP] {
        if let Some(text) = decode_strict(encoding, bytes) {
            return Decoded {
                text,
                encoding: encoding.name(),
                lossy: false,
            };
        }
    }

    tracing::debug!(len = bytes.len(), "no encoding matched; decoding with replacement");
    Decoded {
        text: String::from_utf8_lossy(bytes),
        encoding: "utf-8",
        lossy: true,
    }
}

fn decode_strict<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    encoding.decode_without_bom_handling_and_without_replacement(bytes)
}

/// Check the trimmed character length against `[min, max]`.
///
/// `max = None` skips the upper bound for modes that accept long inputs.
pub fn validate_length(text: &str, min: usize, max: Option<usize>) -> Result<(), ChunkError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChunkError::Empty);
    }
    let len = trimmed.chars().count();
    if len < min {
        return Err(ChunkError::TooShort { len, min });
    }
    if let Some(max) = max {
        if len > max {
            return Err(ChunkError::TooLong { len, max });
        }
    }
    Ok(())
}

/// Trim, and collapse runs of blank lines down to a single blank line.
pub fn clean_chunk(chunk: &str) -> String {
    let trimmed = chunk.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    BLANK_RUN.replace_all(trimmed, "\n\n").into_owned()
}
