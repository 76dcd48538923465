//! Per-reader bookkeeping: which sentences have been seen, checked, and flagged.
//!
//! A [`ReadingSession`] is owned by whoever drives the reading surface and is passed by
//! `&mut`; nothing here is shared or global.

use factpipe_core::{Claim, Source};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceRecord {
    pub text: String,
    pub is_fact_checked: bool,
    pub is_claim: bool,
    pub sources: Vec<Source>,
}

impl SentenceRecord {
    fn new(text: String) -> Self {
        Self {
            text,
            is_fact_checked: false,
            is_claim: false,
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReadingSession {
    records: Vec<SentenceRecord>,
    index: HashMap<String, usize>,
    visible: HashSet<usize>,
}

impl ReadingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the visible set with `sentences` and return the ones never seen before,
    /// in input order.
    pub fn observe<I, S>(&mut self, sentences: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fresh = Vec::new();
        let mut visible = HashSet::new();
        for s in sentences {
            let text = s.as_ref().trim();
            if text.is_empty() {
                continue;
            }
            let i = match self.index.get(text) {
                Some(&i) => i,
                None => {
                    let i = self.records.len();
                    self.records.push(SentenceRecord::new(text.to_string()));
                    self.index.insert(text.to_string(), i);
                    fresh.push(text.to_string());
                    i
                }
            };
            visible.insert(i);
        }
        self.visible = visible;
        fresh
    }

    /// Seen sentences that have not been fact-checked yet, first-seen first.
    pub fn pending(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| !r.is_fact_checked)
            .map(|r| r.text.as_str())
            .collect()
    }

    /// Returns how many of `texts` were known.
    pub fn mark_checked<I, S>(&mut self, texts: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut n = 0;
        for t in texts {
            match self.index.get(t.as_ref().trim()) {
                Some(&i) => {
                    self.records[i].is_fact_checked = true;
                    n += 1;
                }
                None => tracing::debug!(sentence = %t.as_ref(), "not in session history"),
            }
        }
        n
    }

    /// Flag records matching each claim and attach its sources.
    ///
    /// A record matches when its text equals the claim sentence or contains it. Returns the
    /// number of records updated.
    pub fn apply_claims(&mut self, claims: &[Claim]) -> usize {
        let mut updated = 0;
        for claim in claims {
            let needle = claim.sentence.trim();
            if needle.is_empty() {
                continue;
            }
            let mut matched = false;
            for r in &mut self.records {
                if r.text == needle || r.text.contains(needle) {
                    r.is_claim = true;
                    r.is_fact_checked = true;
                    r.sources = claim.sources.clone();
                    updated += 1;
                    matched = true;
                }
            }
            if !matched {
                tracing::warn!(claim = %needle, "claim does not match any seen sentence");
            }
        }
        updated
    }

    /// Currently visible records flagged as claims, first-seen first.
    pub fn visible_claims(&self) -> Vec<&SentenceRecord> {
        self.records
            .iter()
            .enumerate()
            .filter(|(i, r)| r.is_claim && self.visible.contains(i))
            .map(|(_, r)| r)
            .collect()
    }

    pub fn fact_checked(&self) -> impl Iterator<Item = &SentenceRecord> {
        self.records.iter().filter(|r| r.is_fact_checked)
    }

    pub fn record(&self, text: &str) -> Option<&SentenceRecord> {
        self.index.get(text.trim()).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[SentenceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
