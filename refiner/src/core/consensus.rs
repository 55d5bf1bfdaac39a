//! Weighted consensus scoring over a panel of raters.

use serde::{Deserialize, Serialize};

use crate::core::error::EngineError;
use crate::core::rating::Rating;

/// A panel member (or a creative persona) with its relative weight.
///
/// `model` and `temperature` are opaque to the engine and only forwarded to
/// collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub identity: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

fn default_weight() -> f64 {
    1.0
}

impl Persona {
    pub fn new(id: &str, name: &str, identity: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            identity: identity.to_string(),
            weight: default_weight(),
            model: None,
            temperature: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Weighted set of raters whose opinions reduce to one score per candidate.
///
/// Weights are normalized once here and never again, regardless of how the
/// panel is used afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    raters: Vec<Persona>,
    weights: Vec<f64>,
}

impl Panel {
    pub fn new(raters: Vec<Persona>) -> Result<Self, EngineError> {
        if raters.is_empty() {
            return Err(EngineError::malformed("panel must have at least one rater"));
        }
        for rater in &raters {
            if !rater.weight.is_finite() || rater.weight < 0.0 {
                return Err(EngineError::malformed(format!(
                    "rater '{}' has invalid weight {}",
                    rater.id, rater.weight
                )));
            }
        }
        let total: f64 = raters.iter().map(|r| r.weight).sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(EngineError::malformed(format!(
                "panel weights must sum to a positive finite value (got {total})"
            )));
        }
        let weights = raters.iter().map(|r| r.weight / total).collect();
        Ok(Self { raters, weights })
    }

    pub fn raters(&self) -> &[Persona] {
        &self.raters
    }

    /// Normalized weights, in panel order.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.raters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raters.is_empty()
    }

    /// Reduce each candidate's per-rater ratings to one score in `[0, 1]`.
    ///
    /// `ratings_per_candidate[i][j]` is rater `j`'s rating of candidate `i`.
    pub fn score<R: Rating>(&self, ratings_per_candidate: &[Vec<R>]) -> Result<Vec<f64>, EngineError> {
        ratings_per_candidate
            .iter()
            .enumerate()
            .map(|(i, ratings)| {
                if ratings.len() != self.weights.len() {
                    return Err(EngineError::malformed(format!(
                        "candidate {i} has {} ratings, panel has {} raters",
                        ratings.len(),
                        self.weights.len()
                    )));
                }
                Ok(self.reduce(ratings))
            })
            .collect()
    }

    fn reduce<R: Rating>(&self, ratings: &[R]) -> f64 {
        // Unanimous ratings score exactly the rating value.
        if let Some(first) = ratings.first() {
            if ratings.iter().all(|r| r == first) {
                return first.value();
            }
        }
        let sum: f64 = self
            .weights
            .iter()
            .zip(ratings)
            .map(|(weight, rating)| weight * rating.value())
            .sum();
        sum.clamp(0.0, 1.0)
    }

    /// Turn rater-major ratings (one list per rater, in panel order) into
    /// candidate-major ratings suitable for [`Panel::score`].
    pub fn by_candidate<R: Rating>(
        &self,
        per_rater: &[Vec<R>],
        candidate_count: usize,
    ) -> Result<Vec<Vec<R>>, EngineError> {
        if per_rater.len() != self.raters.len() {
            return Err(EngineError::malformed(format!(
                "expected ratings from {} raters, got {}",
                self.raters.len(),
                per_rater.len()
            )));
        }
        for (rater, ratings) in self.raters.iter().zip(per_rater) {
            if ratings.len() != candidate_count {
                return Err(EngineError::malformed(format!(
                    "rater '{}' returned {} ratings for {} candidates",
                    rater.id,
                    ratings.len(),
                    candidate_count
                )));
            }
        }
        Ok((0..candidate_count)
            .map(|i| per_rater.iter().map(|ratings| ratings[i]).collect())
            .collect())
    }

    /// Label each rater's feedback with the rater's name, in panel order.
    pub fn present_feedback(&self, feedback: &[String]) -> Vec<String> {
        self.raters
            .iter()
            .zip(feedback)
            .map(|(rater, text)| format!("{}: {}", rater.name, text))
            .collect()
    }
}
