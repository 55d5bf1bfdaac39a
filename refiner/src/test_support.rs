//! Test-only helpers: deterministic fixtures and scripted collaborators.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::Barrier;

use crate::core::consensus::{Panel, Persona};
use crate::core::rating::LikertRating;
use crate::core::state::{Objective, RefineSettings};
use crate::io::collaborator::{
    Collaborators, EvaluationRequest, Evaluator, GenerationRequest, Generator, Proposal, Reaction,
};

/// Create a deterministic persona with weight 1.
pub fn persona(id: &str) -> Persona {
    Persona::new(id, &format!("{id} name"), &format!("{id} identity"))
}

pub fn objective() -> Objective {
    Objective {
        id: "smoking".to_string(),
        content: "smoking is bad".to_string(),
        objective: "deter smoking".to_string(),
        deliverable: "billboard slogan".to_string(),
    }
}

/// Settings with an equally weighted panel of `raters` members `r0..rN`.
pub fn settings(raters: usize) -> RefineSettings {
    let panel = Panel::new((0..raters).map(|i| persona(&format!("r{i}"))).collect())
        .expect("test panel");
    RefineSettings {
        objective: objective(),
        panel,
        min_score: 0.7,
        required_count: 2,
        display_count: 3,
        proposals_per_round: 3,
        max_iterations: 5,
    }
}

pub fn proposal(candidates: &[&str]) -> Proposal {
    Proposal {
        learnings: Vec::new(),
        candidates: candidates.iter().map(|c| c.to_string()).collect(),
    }
}

/// Build collaborators with a generous per-call timeout.
pub fn collaborators(generator: ScriptedGenerator, evaluator: ScriptedEvaluator) -> Collaborators {
    Collaborators::new(
        Arc::new(generator),
        Arc::new(evaluator),
        Duration::from_secs(5),
    )
}

/// Generator that replays queued proposals, then fails (or repeats one).
#[derive(Clone)]
pub struct ScriptedGenerator {
    queue: Arc<Mutex<VecDeque<Proposal>>>,
    repeat: Option<Proposal>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl ScriptedGenerator {
    pub fn new(proposals: Vec<Proposal>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(proposals.into())),
            repeat: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn repeating(proposal: Proposal) -> Self {
        Self {
            repeat: Some(proposal),
            ..Self::new(Vec::new())
        }
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Proposal> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let next = self.queue.lock().expect("queue lock").pop_front();
        next.or_else(|| self.repeat.clone())
            .ok_or_else(|| anyhow!("scripted generator exhausted"))
    }
}

/// Evaluator that rates every candidate with a fixed rating unless a rater
/// has scripted ratings, a scripted failure or a scripted hang.
#[derive(Clone)]
pub struct ScriptedEvaluator {
    default_rating: LikertRating,
    ratings: HashMap<String, Vec<LikertRating>>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    barrier: Option<Arc<Barrier>>,
    calls: Arc<Mutex<HashMap<String, u32>>>,
}

impl ScriptedEvaluator {
    pub fn uniform(rating: LikertRating) -> Self {
        Self {
            default_rating: rating,
            ratings: HashMap::new(),
            failing: HashSet::new(),
            hanging: HashSet::new(),
            barrier: None,
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_ratings(mut self, rater_id: &str, ratings: Vec<LikertRating>) -> Self {
        self.ratings.insert(rater_id.to_string(), ratings);
        self
    }

    pub fn failing_for(mut self, rater_id: &str) -> Self {
        self.failing.insert(rater_id.to_string());
        self
    }

    pub fn hanging_for(mut self, rater_id: &str) -> Self {
        self.hanging.insert(rater_id.to_string());
        self
    }

    /// Every call waits on `barrier` before answering, so a call only
    /// completes once as many calls as the barrier size are in flight.
    pub fn meeting_at(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    /// Number of completed or failed calls made for `rater_id`.
    pub fn calls_for(&self, rater_id: &str) -> u32 {
        self.calls
            .lock()
            .expect("calls lock")
            .get(rater_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Reaction> {
        let id = request.rater.id.clone();
        if self.hanging.contains(&id) {
            std::future::pending::<()>().await;
        }
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        // Let sibling raters interleave before this one resolves.
        tokio::task::yield_now().await;
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(id.clone())
            .or_insert(0) += 1;
        if self.failing.contains(&id) {
            return Err(anyhow!("scripted failure for {id}"));
        }
        let ratings = self
            .ratings
            .get(&id)
            .cloned()
            .unwrap_or_else(|| vec![self.default_rating; request.candidates.len()]);
        Ok(Reaction {
            feedback: format!("feedback from {id}"),
            ratings,
        })
    }
}
