//! Capacity-bounded, score-ranked retention of rated candidates.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::core::error::EngineError;

/// A candidate text with its consensus score in `[0, 1]`.
///
/// Only constructible through [`RatedCandidate::new`], so the score range
/// always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatedCandidate {
    text: String,
    score: f64,
}

impl RatedCandidate {
    pub fn new(text: impl Into<String>, score: f64) -> Result<Self, EngineError> {
        if !(0.0..=1.0).contains(&score) {
            return Err(EngineError::malformed(format!(
                "score {score} is outside [0, 1]"
            )));
        }
        Ok(Self {
            text: text.into(),
            score,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn score(&self) -> f64 {
        self.score
    }
}

impl fmt::Display for RatedCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.2}", self.text, self.score)
    }
}

/// Best-N candidates seen so far, sorted by descending score.
///
/// Capacity is fixed at construction. Merging never mutates `self`; it
/// returns a new store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStore {
    capacity: usize,
    entries: Vec<RatedCandidate>,
}

impl RankedStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> &[RatedCandidate] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `incoming` after the existing entries, stable-sort by descending
    /// score and truncate to capacity. Equal scores keep insertion order, so
    /// older entries win ties.
    ///
    /// Candidates are identified by text. A repeated text keeps one entry, at
    /// its first position, with the highest score seen.
    pub fn merged(&self, incoming: impl IntoIterator<Item = RatedCandidate>) -> Self {
        let mut entries: Vec<RatedCandidate> = Vec::with_capacity(self.entries.len());
        let mut index: HashMap<String, usize> = HashMap::new();
        for candidate in self.entries.iter().cloned().chain(incoming) {
            match index.get(&candidate.text) {
                Some(&at) => {
                    if candidate.score > entries[at].score {
                        entries[at].score = candidate.score;
                    }
                }
                None => {
                    index.insert(candidate.text.clone(), entries.len());
                    entries.push(candidate);
                }
            }
        }
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        entries.truncate(self.capacity);
        Self {
            capacity: self.capacity,
            entries,
        }
    }

    /// Leading entries with `score >= min_score`.
    pub fn best(&self, min_score: f64) -> &[RatedCandidate] {
        let end = self
            .entries
            .iter()
            .position(|entry| entry.score < min_score)
            .unwrap_or(self.entries.len());
        &self.entries[..end]
    }

    /// Like [`RankedStore::best`], capped to `n` entries.
    pub fn best_n(&self, n: usize, min_score: f64) -> &[RatedCandidate] {
        let best = self.best(min_score);
        &best[..best.len().min(n)]
    }

    /// Render the top `n` entries, one `text: score` line each.
    pub fn show(&self, n: usize) -> String {
        self.best_n(n, 0.0)
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
