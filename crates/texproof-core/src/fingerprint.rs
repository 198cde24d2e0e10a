//! Content-addressed fingerprints.
//!
//! A [`Fingerprint`] is the lowercase hex SHA-256 digest of a byte sequence,
//! optionally scoped by a role prefix such as `"page_3"`. Fingerprints are
//! the primary key of every cache entry, so the same bytes analysed in two
//! different roles must never collide:
//!
//! ```rust
//! use texproof_core::fingerprint::{fingerprint, page_prefix};
//!
//! let bytes = b"%PDF-1.5 ...";
//! let whole = fingerprint(bytes, None);
//! let page = fingerprint(bytes, Some(&page_prefix(1)));
//! assert_ne!(whole, page);
//! assert_eq!(whole, fingerprint(bytes, None));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
const HEX_LEN: usize = 64;

/// A 256-bit content digest, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Accepts a 64 character lowercase hex string, as produced by [`fingerprint`].
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == HEX_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex chars, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("invalid fingerprint: {:?}", s))
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash `bytes`, optionally scoped by `prefix`.
///
/// The prefix is length-framed before hashing so that `("page_1", b"2...")`
/// and `("page_12", b"...")` cannot produce the same input stream. An empty
/// prefix is treated the same as no prefix.
pub fn fingerprint(bytes: &[u8], prefix: Option<&str>) -> Fingerprint {
    let mut hasher = Sha256::new();
    if let Some(p) = prefix.filter(|p| !p.is_empty()) {
        hasher.update((p.len() as u64).to_le_bytes());
        hasher.update(p.as_bytes());
    }
    hasher.update(bytes);
    Fingerprint(hex::encode(hasher.finalize()))
}

/// Role prefix used for page-level cache keys.
pub fn page_prefix(page_number: u32) -> String {
    format!("page_{}", page_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = fingerprint(b"hello", Some("page_1"));
        let b = fingerprint(b"hello", Some("page_1"));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), HEX_LEN);
    }

    #[test]
    fn test_prefix_changes_digest() {
        let base = fingerprint(b"hello", None);
        let p1 = fingerprint(b"hello", Some("page_1"));
        let p2 = fingerprint(b"hello", Some("page_2"));
        assert_ne!(base, p1);
        assert_ne!(p1, p2);
    }

    #[test]
    fn test_prefix_is_framed() {
        let a = fingerprint(b"2abc", Some("page_1"));
        let b = fingerprint(b"abc", Some("page_12"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_input_and_empty_prefix() {
        let empty = fingerprint(b"", None);
        assert_eq!(
            empty.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(fingerprint(b"x", Some("")), fingerprint(b"x", None));
    }

    #[test]
    fn test_parse_round_trip() {
        let fp = fingerprint(b"doc", None);
        assert_eq!(Fingerprint::parse(fp.as_str()), Some(fp.clone()));
        assert_eq!(fp.short().len(), 8);
        assert!(Fingerprint::parse("not-a-digest").is_none());
        assert!(Fingerprint::parse(&fp.as_str().to_uppercase()).is_none());
    }

    #[test]
    fn test_deserialize_validates() {
        let fp = fingerprint(b"doc", None);
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{}\"", fp));
        assert_eq!(serde_json::from_str::<Fingerprint>(&json).unwrap(), fp);
        assert!(serde_json::from_str::<Fingerprint>("\"ab\"").is_err());
    }
}
