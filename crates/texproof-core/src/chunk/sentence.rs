//! Sentence splitting with markup protection.
//!
//! Sentence boundary detection knows nothing about LaTeX: the periods in
//! `\cite{a.b.c}` or inside an equation environment look like sentence
//! ends. Before tokenizing, every environment and inline command is swapped
//! for an opaque placeholder; each resulting sentence then has its
//! placeholders swapped back.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use unicode_segmentation::UnicodeSegmentation;

/// Opens a placeholder. Private use, so it never collides with markup.
const OPEN: char = '\u{E000}';
/// Closes a placeholder.
const CLOSE: char = '\u{E001}';

static BEGIN_OR_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(begin|end)\s*\{([^}]+)\}").unwrap());
static INLINE_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[a-zA-Z*]+(?:\[[^\]]*\])?(?:\{[^{}]*\})*").unwrap());
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\u{E000}latex(\\d+)\u{E001}").unwrap());

/// The body environment wraps the whole text and is never protected.
const BODY_ENVIRONMENT: &str = "document";

/// Placeholder for `originals[index]`.
///
/// The lowercase word after the sentinel keeps UAX #29 from starting a new
/// sentence at the placeholder, so `e.g. \cite{x}` stays one sentence.
fn placeholder(index: usize) -> String {
    format!("{}latex{}{}", OPEN, index, CLOSE)
}

/// Text with markup replaced by placeholders, plus the originals by index.
#[derive(Debug)]
pub(crate) struct Protected {
    pub text: String,
    originals: Vec<String>,
}

impl Protected {
    fn push(&mut self, original: &str) -> String {
        let token = placeholder(self.originals.len());
        self.originals.push(original.to_string());
        token
    }

    /// Swap placeholders in `fragment` back to their original markup.
    ///
    /// An original only ever contains placeholders created before it, so
    /// expansion recurses on strictly smaller indices. Restored text is
    /// never scanned again.
    pub fn restore(&self, fragment: &str) -> String {
        self.expand(fragment, self.originals.len())
    }

    fn expand(&self, fragment: &str, limit: usize) -> String {
        PLACEHOLDER
            .replace_all(fragment, |caps: &Captures| {
                match caps[1].parse::<usize>() {
                    Ok(i) if i < limit => match self.originals.get(i) {
                        Some(original) => self.expand(original, i),
                        None => caps[0].to_string(),
                    },
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

struct OpenEnvironment<'a> {
    start: usize,
    name: &'a str,
    depth: usize,
}

/// Byte spans of outermost environments, each `\begin{X}` paired with its
/// own `\end{X}`. Unclosed environments are left out.
fn environment_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Option<OpenEnvironment> = None;

    for caps in BEGIN_OR_END.captures_iter(text) {
        let (Some(whole), Some(kind), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let name = name.as_str().trim();
        if name == BODY_ENVIRONMENT {
            continue;
        }
        let is_begin = kind.as_str() == "begin";

        if let Some(env) = open.as_mut() {
            if env.name != name {
                continue;
            }
            if is_begin {
                env.depth += 1;
            } else {
                env.depth -= 1;
            }
            if env.depth == 0 {
                spans.push((env.start, whole.end()));
                open = None;
            }
        } else if is_begin {
            open = Some(OpenEnvironment {
                start: whole.start(),
                name,
                depth: 1,
            });
        }
    }
    spans
}

/// Replace environments, then inline commands, with placeholders.
///
/// Sentinel characters already present in the input are protected first,
/// so every placeholder in the result is one this function created.
pub(crate) fn protect(text: &str) -> Protected {
    let mut protected = Protected {
        text: String::new(),
        originals: Vec::new(),
    };

    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == OPEN {
            let token = protected.push(&c.to_string());
            escaped.push_str(&token);
        } else {
            escaped.push(c);
        }
    }

    let mut without_envs = String::with_capacity(escaped.len());
    let mut cursor = 0;
    for (start, end) in environment_spans(&escaped) {
        without_envs.push_str(&escaped[cursor..start]);
        let token = protected.push(&escaped[start..end]);
        without_envs.push_str(&token);
        cursor = end;
    }
    without_envs.push_str(&escaped[cursor..]);

    let without_cmds = INLINE_COMMAND
        .replace_all(&without_envs, |caps: &Captures| protected.push(&caps[0]))
        .into_owned();

    protected.text = without_cmds;
    protected
}

/// Split into sentences without breaking inside markup.
pub(crate) fn split(text: &str) -> Vec<String> {
    let protected = protect(text);
    protected
        .text
        .split_sentence_bounds()
        .map(|sentence| protected.restore(sentence))
        .filter(|s| !s.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_citation_stays_with_sentence() {
        let pieces: Vec<String> = split("See \\cite{a.b.c}. Next sentence.")
            .into_iter()
            .map(|s| s.trim().to_string())
            .collect();
        assert_eq!(pieces, vec!["See \\cite{a.b.c}.", "Next sentence."]);
    }

    #[test]
    fn test_environment_is_not_fragmented() {
        let text = "We prove it. \\begin{equation} x = 1. y = 2. \\end{equation} Done here.";
        let pieces = split(text);
        let env = pieces
            .iter()
            .find(|p| p.contains("\\begin{equation}"))
            .expect("environment piece");
        assert!(env.contains("x = 1. y = 2."));
        assert!(env.contains("\\end{equation}"));
    }

    #[test]
    fn test_protect_restore_round_trip() {
        let text = "A \\textbf{b.c} and \\begin{itemize}\\item one.\\end{itemize} end.";
        let protected = protect(text);
        assert!(!protected.text.contains('\\'));
        assert_eq!(protected.restore(&protected.text), text);
    }

    #[test]
    fn test_nested_placeholder_restored() {
        let protected = Protected {
            text: String::new(),
            originals: vec!["\\begin{x}.\\end{x}".into(), format!("\\cmd{{{}}}", placeholder(0))],
        };
        assert_eq!(
            protected.restore(&format!("see {}.", placeholder(1))),
            "see \\cmd{\\begin{x}.\\end{x}}."
        );
    }

    #[test]
    fn test_abbreviation_before_markup_does_not_split() {
        let pieces: Vec<String> = split(
            "Prior work, e.g. \\cite{smith.2020}, caches nothing. See Fig. \\ref{f1} for details.",
        )
        .into_iter()
        .map(|s| s.trim().to_string())
        .collect();
        assert_eq!(
            pieces,
            vec![
                "Prior work, e.g. \\cite{smith.2020}, caches nothing.",
                "See Fig. \\ref{f1} for details.",
            ]
        );
    }

    #[test]
    fn test_document_environment_is_not_protected() {
        let text = "\\begin{document}\nFirst sentence here. Second sentence here.\n\\begin{equation}\nx = 1\n\\end{equation}\n\\end{document}";
        let pieces = split(text);
        assert!(pieces.iter().any(|p| p.trim() == "Second sentence here."));
        assert!(!pieces
            .iter()
            .any(|p| p.contains("First sentence") && p.contains("Second sentence")));
    }

    #[test]
    fn test_environment_spans_pair_by_name() {
        let text = "a \\begin{itemize}\\begin{itemize}x\\end{itemize}\\end{itemize} b \\begin{figure}y\\end{table} c";
        let spans = environment_spans(text);
        assert_eq!(spans.len(), 1);
        let (start, end) = spans[0];
        assert_eq!(
            &text[start..end],
            "\\begin{itemize}\\begin{itemize}x\\end{itemize}\\end{itemize}"
        );
    }

    #[test]
    fn test_literal_sentinel_in_input_survives() {
        let text = format!("Odd {} text. And \\cite{{k}} here.", placeholder(0));
        let protected = protect(&text);
        assert_eq!(protected.restore(&protected.text), text);
        assert_eq!(split(&text).concat(), text);
    }
}
