//! Stable exit codes for refiner CLI commands.

use crate::core::goal::enough_accepted;
use crate::core::planner::{PlanOutcome, PlanStop};
use crate::core::state::State;

/// Enough candidates accepted, or a non-run command succeeded.
pub const OK: i32 = 0;
/// Invalid config, collaborator failure or other errors.
pub const INVALID: i32 = 1;
/// The run stopped at the planner's step ceiling without reaching the goal.
pub const SAFETY_BOUND: i32 = 2;
/// No action was applicable.
pub const STUCK: i32 = 3;
/// The run was cancelled (e.g. Ctrl-C).
pub const CANCELLED: i32 = 4;
/// The iteration budget ran out before enough candidates were accepted.
pub const EXHAUSTED: i32 = 5;

pub fn for_stop(stop: &PlanStop) -> i32 {
    match stop {
        PlanStop::GoalReached => OK,
        PlanStop::SafetyBoundReached { .. } => SAFETY_BOUND,
        PlanStop::Stuck => STUCK,
        PlanStop::Cancelled => CANCELLED,
    }
}

/// Like [`for_stop`], but a goal stop only counts as `OK` when the accepted
/// candidates actually cover `required_count`.
pub fn for_outcome(outcome: &PlanOutcome<State>) -> i32 {
    match outcome.stop {
        PlanStop::GoalReached if !enough_accepted(&outcome.state) => EXHAUSTED,
        ref stop => for_stop(stop),
    }
}
