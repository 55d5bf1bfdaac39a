//! First-match action scheduler.
//!
//! Each tick the planner checks the goal, picks the first registered action
//! whose precondition holds, applies its belief update and then awaits its
//! effect. Registration order is the priority order; nothing is adaptive or
//! cost-based. The loop is strictly sequential: a tick never starts before the
//! previous effect has completed and its state is installed.

use std::fmt;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::error::EngineError;

pub type Precondition<S> = fn(&S) -> bool;
pub type Belief<S> = fn(S) -> S;
pub type Effect<S, C> = for<'a> fn(S, &'a C) -> BoxFuture<'a, Result<S, EngineError>>;

/// A named unit of work. Holds no state of its own.
pub struct Action<S, C> {
    pub name: &'static str,
    pub precondition: Precondition<S>,
    /// Pure, synchronous intent update applied before the effect.
    pub belief: Belief<S>,
    /// External-facing work; may fail or suspend.
    pub effect: Effect<S, C>,
}

/// Named termination predicate, checked at the start of every tick.
pub struct Goal<S> {
    pub name: &'static str,
    pub test: fn(&S) -> bool,
}

/// Why `Planner::run` stopped without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStop {
    /// The goal predicate holds.
    GoalReached,
    /// No registered action's precondition holds.
    Stuck,
    /// The planner's own step ceiling was hit before the goal.
    SafetyBoundReached { max_steps: u32 },
    /// The caller's cancellation token fired.
    Cancelled,
}

/// Final state and stop reason of a run.
#[derive(Debug, Clone)]
pub struct PlanOutcome<S> {
    pub state: S,
    pub steps_executed: u32,
    pub stop: PlanStop,
}

/// Reported to the `on_step` observer after each successful step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// 1-indexed step number.
    pub step: u32,
    pub action: &'static str,
}

/// An action's effect failed; the run is aborted.
///
/// `state` is the state as it was before the failing step began, so nothing
/// the failed step touched is visible in it.
#[derive(Debug)]
pub struct StepError<S> {
    pub action: &'static str,
    pub step: u32,
    pub state: S,
    pub source: EngineError,
}

impl<S> fmt::Display for StepError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "action '{}' failed at step {}: {}",
            self.action, self.step, self.source
        )
    }
}

impl<S: fmt::Debug> std::error::Error for StepError<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

pub struct Planner<S, C> {
    goal: Goal<S>,
    actions: Vec<Action<S, C>>,
    max_steps: u32,
}

impl<S: Clone, C> Planner<S, C> {
    /// Create a planner that stops after at most `max_steps` executed actions.
    pub fn new(goal: Goal<S>, max_steps: u32) -> Self {
        Self {
            goal,
            actions: Vec::new(),
            max_steps,
        }
    }

    /// Register an action. Earlier registrations take priority.
    pub fn with_action(mut self, action: Action<S, C>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn goal_name(&self) -> &'static str {
        self.goal.name
    }

    pub fn action_names(&self) -> Vec<&'static str> {
        self.actions.iter().map(|a| a.name).collect()
    }

    /// First action, in registration order, whose precondition holds.
    pub fn select(&self, state: &S) -> Option<&Action<S, C>> {
        self.actions.iter().find(|a| (a.precondition)(state))
    }

    /// Drive `initial` until the goal holds, no action applies, the step
    /// ceiling is reached or `cancel` fires.
    ///
    /// Effect failures abort the run and are returned as [`StepError`]; there
    /// are no retries. Cancellation drops the in-flight effect, which cancels
    /// whatever it was awaiting.
    pub async fn run<F: FnMut(&StepReport, &S)>(
        &self,
        initial: S,
        ctx: &C,
        cancel: &CancellationToken,
        mut on_step: F,
    ) -> Result<PlanOutcome<S>, StepError<S>> {
        let mut state = initial;
        let mut steps_executed = 0u32;

        loop {
            let stop = if (self.goal.test)(&state) {
                Some(PlanStop::GoalReached)
            } else if cancel.is_cancelled() {
                Some(PlanStop::Cancelled)
            } else if steps_executed >= self.max_steps {
                Some(PlanStop::SafetyBoundReached {
                    max_steps: self.max_steps,
                })
            } else {
                None
            };
            if let Some(stop) = stop {
                info!(goal = self.goal.name, steps_executed, stop = ?stop, "planner stopped");
                return Ok(PlanOutcome {
                    state,
                    steps_executed,
                    stop,
                });
            }

            let Some(action) = self.select(&state) else {
                warn!(steps_executed, "no applicable action");
                return Ok(PlanOutcome {
                    state,
                    steps_executed,
                    stop: PlanStop::Stuck,
                });
            };
            let step = steps_executed + 1;
            debug!(step, action = action.name, "selected action");

            let before = state.clone();
            let believed = (action.belief)(state);
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = (action.effect)(believed, ctx) => Some(result),
            };

            match result {
                Some(Ok(next)) => {
                    steps_executed = step;
                    state = next;
                    on_step(
                        &StepReport {
                            step,
                            action: action.name,
                        },
                        &state,
                    );
                }
                None | Some(Err(EngineError::Cancelled)) => {
                    info!(step, action = action.name, "step cancelled");
                    return Ok(PlanOutcome {
                        state: before,
                        steps_executed,
                        stop: PlanStop::Cancelled,
                    });
                }
                Some(Err(source)) => {
                    warn!(step, action = action.name, error = %source, "step failed");
                    return Err(StepError {
                        action: action.name,
                        step,
                        state: before,
                        source,
                    });
                }
            }
        }
    }
}
