//! Split article text into candidate statements.
//!
//! Boundary detection is pluggable ([`SentenceSplitter`]); the default follows Unicode
//! sentence boundaries (UAX #29) rather than a hand-written punctuation regex.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Statements at or below this many characters (after trimming) are treated as noise.
pub const MIN_STATEMENT_CHARS: usize = 30;

/// Words that mark a sentence as continuing the previous thought.
pub const TRANSITION_WORDS: &[&str] = &[
    "and",
    "but",
    "however",
    "although",
    "moreover",
    "furthermore",
    "nevertheless",
    "therefore",
    "thus",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateStatement {
    pub text: String,
}

pub trait SentenceSplitter: Send + Sync {
    /// Raw sentence spans in document order. Spans may carry surrounding whitespace.
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeSentences;

impl SentenceSplitter for UnicodeSentences {
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.unicode_sentences().collect()
    }
}

pub struct Segmenter {
    splitter: Box<dyn SentenceSplitter>,
    merge_continuations: bool,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(Box::new(UnicodeSentences))
    }
}

impl std::fmt::Debug for Segmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segmenter")
            .field("merge_continuations", &self.merge_continuations)
            .finish_non_exhaustive()
    }
}

impl Segmenter {
    pub fn new(splitter: Box<dyn SentenceSplitter>) -> Self {
        Self {
            splitter,
            merge_continuations: true,
        }
    }

    pub fn merge_continuations(mut self, on: bool) -> Self {
        self.merge_continuations = on;
        self
    }

    pub fn segment(&self, text: &str) -> Vec<CandidateStatement> {
        let mut out: Vec<CandidateStatement> = Vec::new();
        for raw in self.splitter.split(text) {
            let s = raw.trim();
            if s.chars().count() <= MIN_STATEMENT_CHARS {
                continue;
            }
            if self.merge_continuations {
                if let Some(prev) = out.last_mut() {
                    if continues(&prev.text, s) {
                        prev.text.push(' ');
                        prev.text.push_str(s);
                        continue;
                    }
                }
            }
            out.push(CandidateStatement {
                text: s.to_string(),
            });
        }
        out
    }
}

/// Text handed to the evaluator when segmentation is on: one statement per line.
pub fn statements_to_text(statements: &[CandidateStatement]) -> String {
    statements
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn continues(prev: &str, next: &str) -> bool {
    if next.chars().next().is_some_and(|c| c.is_lowercase()) {
        return true;
    }
    let first_word: String = next
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();
    if TRANSITION_WORDS.contains(&first_word.as_str()) {
        return true;
    }
    !ends_sentence(prev)
}

fn ends_sentence(s: &str) -> bool {
    let core = s
        .trim_end()
        .trim_end_matches(['"', '\'', '\u{201d}', '\u{2019}', ')', ']']);
    core.ends_with(['.', '!', '?', '\u{2026}'])
}
