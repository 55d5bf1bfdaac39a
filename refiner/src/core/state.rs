//! Immutable refinement state and the engine-facing configuration it carries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::consensus::Panel;
use crate::core::ranked_store::{RankedStore, RatedCandidate};

/// The message being refined, passed opaquely to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    /// Identifier, in case there are variants of the same message.
    pub id: String,
    /// The logical message, e.g. "smoking is bad".
    pub content: String,
    /// What the wording should achieve, e.g. "deter smoking".
    pub objective: String,
    /// The kind of deliverable, e.g. "billboard slogan".
    pub deliverable: String,
}

/// Limits and registries consumed by the reference actions and goal.
#[derive(Debug, Clone)]
pub struct RefineSettings {
    pub objective: Objective,
    pub panel: Panel,
    pub min_score: f64,
    pub required_count: usize,
    pub display_count: usize,
    pub proposals_per_round: usize,
    pub max_iterations: u32,
}

impl RefineSettings {
    /// Store capacity: enough to satisfy the goal and to show `display_count`.
    pub fn store_capacity(&self) -> usize {
        self.required_count.max(self.display_count)
    }
}

/// Which half of the generate/evaluate cycle comes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing is pending; new candidates are needed.
    NeedsCandidates,
    /// A generated batch is waiting to be rated.
    AwaitingEvaluation,
}

/// Refinement state. Replaced, never mutated, by each planner step.
#[derive(Debug, Clone)]
pub struct State {
    pub settings: Arc<RefineSettings>,
    pub best: RankedStore,
    pub iteration: u32,
    pub phase: Phase,
    pub pending: Vec<String>,
    pub feedback: Vec<String>,
    pub learnings: Vec<String>,
}

impl State {
    pub fn new(settings: RefineSettings) -> Self {
        let best = RankedStore::new(settings.store_capacity());
        Self {
            settings: Arc::new(settings),
            best,
            iteration: 0,
            phase: Phase::NeedsCandidates,
            pending: Vec::new(),
            feedback: Vec::new(),
            learnings: Vec::new(),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.phase == Phase::AwaitingEvaluation
    }

    /// Top `required_count` entries regardless of score.
    pub fn result(&self) -> &[RatedCandidate] {
        self.best.best_n(self.settings.required_count, 0.0)
    }

    /// Entries meeting `min_score`.
    pub fn accepted(&self) -> &[RatedCandidate] {
        self.best.best(self.settings.min_score)
    }
}
