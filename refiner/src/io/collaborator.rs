//! Generation and evaluation collaborator boundaries.
//!
//! The [`Generator`] and [`Evaluator`] traits decouple the refinement actions
//! from whatever service produces and rates candidates. Tests use scripted
//! collaborators; the CLI uses the subprocess transport in [`crate::io::command`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::consensus::Persona;
use crate::core::error::EngineError;
use crate::core::ranked_store::RatedCandidate;
use crate::core::rating::LikertRating;
use crate::core::state::Objective;

/// Input for one generation call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub objective: Objective,
    /// Current top entries of the ranked store.
    pub prior_best: Vec<RatedCandidate>,
    pub feedback: Vec<String>,
    pub learnings: Vec<String>,
    /// Upper bound on the number of candidates wanted.
    pub count: usize,
}

/// A batch of new candidates plus what the generator learned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(default)]
    pub learnings: Vec<String>,
    pub candidates: Vec<String>,
}

/// Input for one rater's evaluation call.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRequest {
    pub objective: Objective,
    pub rater: Persona,
    pub candidates: Vec<String>,
}

/// One rater's reaction: free-text feedback and one rating per candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    #[serde(default)]
    pub feedback: String,
    pub ratings: Vec<LikertRating>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Proposal>;
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Reaction>;
}

/// Collaborators and the per-call timeout applied around every call.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn Generator>,
    pub evaluator: Arc<dyn Evaluator>,
    pub call_timeout: Duration,
}

impl Collaborators {
    pub fn new(
        generator: Arc<dyn Generator>,
        evaluator: Arc<dyn Evaluator>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            evaluator,
            call_timeout,
        }
    }

    #[instrument(skip_all, fields(count = request.count, timeout_secs = self.call_timeout.as_secs()))]
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Proposal, EngineError> {
        let label = "generator";
        match tokio::time::timeout(self.call_timeout, self.generator.generate(request)).await {
            Ok(Ok(proposal)) => {
                debug!(candidates = proposal.candidates.len(), "generation completed");
                Ok(proposal)
            }
            Ok(Err(err)) => {
                warn!(error = %format!("{err:#}"), "generation failed");
                Err(EngineError::collaborator(label, err))
            }
            Err(_) => {
                warn!("generation timed out");
                Err(EngineError::Timeout {
                    collaborator: label.to_string(),
                    timeout: self.call_timeout,
                })
            }
        }
    }

    #[instrument(skip_all, fields(rater = %request.rater.id, candidates = request.candidates.len()))]
    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<Reaction, EngineError> {
        let label = format!("evaluator[{}]", request.rater.id);
        match tokio::time::timeout(self.call_timeout, self.evaluator.evaluate(request)).await {
            Ok(Ok(reaction)) => {
                debug!(ratings = reaction.ratings.len(), "evaluation completed");
                Ok(reaction)
            }
            Ok(Err(err)) => {
                warn!(error = %format!("{err:#}"), "evaluation failed");
                Err(EngineError::collaborator(label, err))
            }
            Err(_) => {
                warn!("evaluation timed out");
                Err(EngineError::Timeout {
                    collaborator: label,
                    timeout: self.call_timeout,
                })
            }
        }
    }
}
