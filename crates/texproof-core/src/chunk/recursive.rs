//! Length-bounded recursive splitting.
//!
//! Tries each separator in priority order: the first one present in the
//! text is used to cut it into pieces; pieces that are still too long are
//! split again with the remaining separators. Small neighbouring pieces are
//! merged back together up to `chunk_size` characters, and consecutive
//! chunks share up to `chunk_overlap` characters of trailing context.
//!
//! Separators stay attached to the end of the piece they terminate, so no
//! text is lost. Lengths are counted in `char`s.

use std::collections::VecDeque;

/// Sentence ends, then paragraph breaks, then line breaks, then spaces.
pub const DEFAULT_SEPARATORS: &[&str] = &[". ", "! ", "? ", "\n\n", "\n", " "];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter<'s> {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &'s [&'s str],
}

impl<'s> RecursiveSplitter<'s> {
    pub fn new(chunk_size: usize, chunk_overlap: usize, separators: &'s [&'s str]) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators,
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, self.separators)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // First separator that occurs in the text; fall back to characters.
        let chosen = separators
            .iter()
            .position(|sep| !sep.is_empty() && text.contains(sep));
        let (pieces, rest): (Vec<&str>, &[&str]) = match chosen {
            Some(i) => (text.split_inclusive(separators[i]).collect(), &separators[i + 1..]),
            None => (char_pieces(text), &[]),
        };

        let mut out = Vec::new();
        let mut small: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                out.extend(self.merge(&small));
                small.clear();
            }
            if rest.is_empty() && chosen.is_none() {
                out.push(piece.to_string());
            } else {
                out.extend(self.split_with(piece, rest));
            }
        }
        if !small.is_empty() {
            out.extend(self.merge(&small));
        }
        out
    }

    /// Greedily join pieces up to `chunk_size`, carrying overlap forward.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut docs, &window);
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }
        push_joined(&mut docs, &window);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn char_pieces(text: &str) -> Vec<&str> {
    text.char_indices()
        .map(|(i, c)| &text[i..i + c.len_utf8()])
        .collect()
}
