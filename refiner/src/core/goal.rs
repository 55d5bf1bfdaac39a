//! Reference goal for refinement runs.

use crate::core::planner::Goal;
use crate::core::state::State;

pub const GOAL_NAME: &str = "needed number of good candidates reached";

/// Done when enough candidates meet `min_score`, or the iteration budget is
/// spent. The planner's own step ceiling applies on top of this.
pub fn refinement_goal() -> Goal<State> {
    Goal {
        name: GOAL_NAME,
        test: enough_accepted_or_exhausted,
    }
}

pub fn enough_accepted_or_exhausted(state: &State) -> bool {
    enough_accepted(state) || state.iteration >= state.settings.max_iterations
}

/// The trustworthy half of the goal: at least `required_count` candidates
/// meet `min_score`. A goal stop without this is a best-effort result.
pub fn enough_accepted(state: &State) -> bool {
    state.accepted().len() >= state.settings.required_count
}
