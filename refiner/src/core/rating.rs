//! Discrete rating scales.
//!
//! A scale is any finite, totally ordered set of symbolic ratings, each mapped
//! to a value in `[0, 1]`. The consensus scorer is generic over [`Rating`] so
//! callers can bring their own scale; [`LikertRating`] is the reference one.

use serde::{Deserialize, Serialize};

/// A symbolic rating on an ordered scale.
///
/// Implementations must return a finite value in `[0, 1]` and keep the
/// mapping monotone with respect to `Ord`.
pub trait Rating: Copy + Ord {
    fn value(self) -> f64;
}

/// Five-point Likert scale spanning `0.0..=1.0` in steps of `0.25`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LikertRating {
    StronglyDisagree,
    Disagree,
    Neutral,
    Agree,
    StronglyAgree,
}

impl LikertRating {
    pub const ALL: [LikertRating; 5] = [
        LikertRating::StronglyDisagree,
        LikertRating::Disagree,
        LikertRating::Neutral,
        LikertRating::Agree,
        LikertRating::StronglyAgree,
    ];
}

impl Rating for LikertRating {
    fn value(self) -> f64 {
        match self {
            LikertRating::StronglyDisagree => 0.0,
            LikertRating::Disagree => 0.25,
            LikertRating::Neutral => 0.5,
            LikertRating::Agree => 0.75,
            LikertRating::StronglyAgree => 1.0,
        }
    }
}
