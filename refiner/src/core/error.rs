//! Error taxonomy for engine effects.
//!
//! Outcomes that are not failures (goal reached, stuck, safety bound,
//! cancellation) are reported through [`crate::core::planner::PlanStop`]
//! instead. `Cancelled` exists here so an effect can surface a cancellation
//! it observed on its own; the planner converts it into a stop.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Input violated a shape contract (e.g. rating count mismatch).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A generation or evaluation call failed.
    #[error("{collaborator} failed: {source:#}")]
    Collaborator {
        collaborator: String,
        #[source]
        source: anyhow::Error,
    },

    /// A collaborator call exceeded its per-call timeout.
    #[error("{collaborator} timed out after {timeout:?}")]
    Timeout {
        collaborator: String,
        timeout: Duration,
    },

    #[error("cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    pub fn collaborator(collaborator: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Collaborator {
            collaborator: collaborator.into(),
            source,
        }
    }
}
