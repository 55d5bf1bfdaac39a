//! Reference generate/evaluate actions wired into the planner.
//!
//! Action order matters: `generate` is registered before `evaluate`. Their
//! preconditions are exclusive and exhaustive over [`Phase`], so they
//! alternate strictly.

use futures::future::{BoxFuture, join_all};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::core::error::EngineError;
use crate::core::goal::refinement_goal;
use crate::core::planner::{Action, PlanOutcome, PlanStop, Planner, StepError, StepReport};
use crate::core::ranked_store::RatedCandidate;
use crate::core::state::{Phase, RefineSettings, State};
use crate::io::collaborator::{Collaborators, EvaluationRequest, GenerationRequest};

pub const GENERATE: &str = "generate candidates";
pub const EVALUATE: &str = "run focus group";

/// Planner with the reference goal and the generate/evaluate actions.
pub fn refinement_planner(max_steps: u32) -> Planner<State, Collaborators> {
    Planner::new(refinement_goal(), max_steps)
        .with_action(Action {
            name: GENERATE,
            precondition: needs_candidates,
            belief: begin_round,
            effect: generate_effect,
        })
        .with_action(Action {
            name: EVALUATE,
            precondition: awaiting_evaluation,
            belief: mark_evaluating,
            effect: evaluate_effect,
        })
}

/// Run a full refinement from fresh state.
///
/// When the iteration budget runs out right after a Generate, the goal stops
/// the run before that batch is rated. The batch is dropped from the returned
/// state, so `pending` is empty whenever the goal was reached.
pub async fn run_refinement<F: FnMut(&StepReport, &State)>(
    settings: RefineSettings,
    max_steps: u32,
    collaborators: &Collaborators,
    cancel: &CancellationToken,
    on_step: F,
) -> Result<PlanOutcome<State>, StepError<State>> {
    let planner = refinement_planner(max_steps);
    let mut outcome = planner
        .run(State::new(settings), collaborators, cancel, on_step)
        .await?;
    if outcome.stop == PlanStop::GoalReached && outcome.state.has_pending() {
        warn!(
            discarded = outcome.state.pending.len(),
            "iteration budget reached before the last batch was rated"
        );
        outcome.state.pending.clear();
        outcome.state.phase = Phase::NeedsCandidates;
    }
    Ok(outcome)
}

fn needs_candidates(state: &State) -> bool {
    state.phase == Phase::NeedsCandidates
}

fn awaiting_evaluation(state: &State) -> bool {
    state.phase == Phase::AwaitingEvaluation
}

fn begin_round(mut state: State) -> State {
    state.pending.clear();
    state.iteration += 1;
    state
}

fn mark_evaluating(state: State) -> State {
    state
}

fn generate_effect(state: State, ctx: &Collaborators) -> BoxFuture<'_, Result<State, EngineError>> {
    Box::pin(generate(state, ctx))
}

fn evaluate_effect(state: State, ctx: &Collaborators) -> BoxFuture<'_, Result<State, EngineError>> {
    Box::pin(evaluate(state, ctx))
}

#[instrument(skip_all, fields(iteration = state.iteration))]
async fn generate(mut state: State, ctx: &Collaborators) -> Result<State, EngineError> {
    let settings = state.settings.clone();
    let request = GenerationRequest {
        objective: settings.objective.clone(),
        prior_best: state.best.best_n(settings.display_count, 0.0).to_vec(),
        feedback: state.feedback.clone(),
        learnings: state.learnings.clone(),
        count: settings.proposals_per_round,
    };
    let proposal = ctx.generate(&request).await?;

    let received = proposal.candidates.len();
    let pending: Vec<String> = proposal
        .candidates
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .take(settings.proposals_per_round)
        .collect();
    if pending.len() < received {
        warn!(received, kept = pending.len(), "dropped blank or surplus candidates");
    }

    state.learnings.extend(
        proposal
            .learnings
            .into_iter()
            .filter(|l| !l.trim().is_empty()),
    );
    state.phase = if pending.is_empty() {
        warn!("generator returned no usable candidates");
        Phase::NeedsCandidates
    } else {
        Phase::AwaitingEvaluation
    };
    info!(pending = pending.len(), "candidates generated");
    state.pending = pending;
    Ok(state)
}

#[instrument(skip_all, fields(iteration = state.iteration, pending = state.pending.len()))]
async fn evaluate(mut state: State, ctx: &Collaborators) -> Result<State, EngineError> {
    let settings = state.settings.clone();
    let panel = &settings.panel;
    let requests: Vec<EvaluationRequest> = panel
        .raters()
        .iter()
        .map(|rater| EvaluationRequest {
            objective: settings.objective.clone(),
            rater: rater.clone(),
            candidates: state.pending.clone(),
        })
        .collect();

    // Every rater runs to completion or its own failure; a failure is only
    // surfaced once all of them have finished.
    let results = join_all(requests.iter().map(|request| ctx.evaluate(request))).await;
    let mut reactions = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
        match result {
            Ok(reaction) => reactions.push(reaction),
            Err(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    let per_rater: Vec<_> = reactions.iter().map(|r| r.ratings.clone()).collect();
    let by_candidate = panel.by_candidate(&per_rater, state.pending.len())?;
    let scores = panel.score(&by_candidate)?;
    let rated = state
        .pending
        .drain(..)
        .zip(scores)
        .map(|(text, score)| RatedCandidate::new(text, score))
        .collect::<Result<Vec<_>, _>>()?;

    state.best = state.best.merged(rated);
    let feedback: Vec<String> = reactions.into_iter().map(|r| r.feedback).collect();
    state.feedback.extend(panel.present_feedback(&feedback));
    state.phase = Phase::NeedsCandidates;
    info!(
        stored = state.best.len(),
        accepted = state.accepted().len(),
        "candidates rated"
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Barrier;

    use super::*;
    use crate::core::planner::PlanStop;
    use crate::core::rating::LikertRating;
    use crate::io::collaborator::Proposal;
    use crate::test_support::{
        ScriptedEvaluator, ScriptedGenerator, collaborators, proposal, settings,
    };

    #[test]
    fn generate_is_registered_first() {
        let planner = refinement_planner(10);
        assert_eq!(planner.action_names(), vec![GENERATE, EVALUATE]);
    }

    #[test]
    fn preconditions_are_exclusive_and_exhaustive() {
        let mut state = State::new(settings(2));
        for phase in [Phase::NeedsCandidates, Phase::AwaitingEvaluation] {
            state.phase = phase;
            assert_ne!(needs_candidates(&state), awaiting_evaluation(&state));
        }
    }

    #[tokio::test]
    async fn generate_caps_and_cleans_candidates() {
        let mut settings = settings(1);
        settings.proposals_per_round = 2;
        let generator = ScriptedGenerator::new(vec![Proposal {
            learnings: vec!["rhyme helps".to_string(), " ".to_string()],
            candidates: vec![" ".to_string(), " a ".to_string(), "b".to_string(), "c".to_string()],
        }]);
        let ctx = collaborators(generator, ScriptedEvaluator::uniform(LikertRating::Agree));
        let state = begin_round(State::new(settings));
        let state = generate(state, &ctx).await.expect("generate");
        assert_eq!(state.pending, vec!["a", "b"]);
        assert_eq!(state.learnings, vec!["rhyme helps"]);
        assert_eq!(state.phase, Phase::AwaitingEvaluation);
        assert_eq!(state.iteration, 1);
    }

    #[tokio::test]
    async fn blank_batch_keeps_needing_candidates() {
        let generator = ScriptedGenerator::new(vec![proposal(&["", "  "])]);
        let ctx = collaborators(generator, ScriptedEvaluator::uniform(LikertRating::Agree));
        let state = generate(State::new(settings(1)), &ctx).await.expect("generate");
        assert!(state.pending.is_empty());
        assert_eq!(state.phase, Phase::NeedsCandidates);
    }

    #[tokio::test]
    async fn evaluate_scores_merges_and_records_feedback() {
        let evaluator = ScriptedEvaluator::uniform(LikertRating::Neutral)
            .with_ratings("r0", vec![LikertRating::StronglyAgree, LikertRating::Disagree]);
        let ctx = collaborators(ScriptedGenerator::new(Vec::new()), evaluator);
        let mut state = State::new(settings(2));
        state.pending = vec!["x".to_string(), "y".to_string()];
        state.phase = Phase::AwaitingEvaluation;

        let state = evaluate(state, &ctx).await.expect("evaluate");
        let entries = state.best.entries();
        assert_eq!(entries[0].text(), "x");
        assert_eq!(entries[0].score(), 0.75);
        assert_eq!(entries[1].text(), "y");
        assert_eq!(entries[1].score(), 0.375);
        assert!(state.pending.is_empty());
        assert_eq!(state.phase, Phase::NeedsCandidates);
        assert_eq!(state.feedback, vec!["r0 name: feedback from r0", "r1 name: feedback from r1"]);
    }

    #[tokio::test]
    async fn raters_are_called_concurrently() {
        // Each rater blocks until all three are waiting, so a sequential
        // fan-out never gets past the first one.
        let evaluator = ScriptedEvaluator::uniform(LikertRating::Agree)
            .meeting_at(Arc::new(Barrier::new(3)));
        let ctx = collaborators(ScriptedGenerator::new(Vec::new()), evaluator.clone());
        let mut state = State::new(settings(3));
        state.pending = vec!["x".to_string()];
        state.phase = Phase::AwaitingEvaluation;

        let state = tokio::time::timeout(Duration::from_secs(2), evaluate(state, &ctx))
            .await
            .expect("raters ran one after another")
            .expect("evaluate");
        assert_eq!(state.best.len(), 1);
        for id in ["r0", "r1", "r2"] {
            assert_eq!(evaluator.calls_for(id), 1);
        }
    }

    #[tokio::test]
    async fn one_failing_rater_aborts_without_touching_the_store() {
        let evaluator = ScriptedEvaluator::uniform(LikertRating::StronglyAgree).failing_for("r1");
        let generator = ScriptedGenerator::new(vec![proposal(&["a", "b"]), proposal(&["c"])]);
        let ctx = collaborators(generator, evaluator.clone());

        let mut settings = settings(3);
        settings.required_count = 5;
        let mut before = State::new(settings);
        before.best = before
            .best
            .merged([RatedCandidate::new("kept", 0.6).expect("rated")]);

        let err = refinement_planner(10)
            .run(before.clone(), &ctx, &CancellationToken::new(), |_, _| {})
            .await
            .unwrap_err();
        assert_eq!(err.action, EVALUATE);
        assert_eq!(err.step, 2);
        assert_eq!(err.state.best, before.best);
        assert!(matches!(err.source, EngineError::Collaborator { .. }));
        // Siblings were not cancelled by the failure.
        assert_eq!(evaluator.calls_for("r0"), 1);
        assert_eq!(evaluator.calls_for("r2"), 1);
    }

    #[tokio::test]
    async fn short_rating_list_is_malformed() {
        let evaluator = ScriptedEvaluator::uniform(LikertRating::Agree)
            .with_ratings("r1", vec![LikertRating::Agree]);
        let ctx = collaborators(ScriptedGenerator::new(Vec::new()), evaluator);
        let mut state = State::new(settings(2));
        state.pending = vec!["x".to_string(), "y".to_string()];
        state.phase = Phase::AwaitingEvaluation;
        let err = evaluate(state, &ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn run_stops_at_max_iterations() {
        let mut settings = settings(1);
        settings.max_iterations = 3;
        settings.required_count = 50;
        let generator = ScriptedGenerator::repeating(proposal(&["same"]));
        let ctx = collaborators(generator, ScriptedEvaluator::uniform(LikertRating::Agree));
        let outcome = run_refinement(settings, 1000, &ctx, &CancellationToken::new(), |_, _| {})
            .await
            .expect("run");
        assert_eq!(outcome.stop, PlanStop::GoalReached);
        assert_eq!(outcome.state.iteration, 3);
        // Two full cycles plus the third generate, whose batch is dropped.
        assert_eq!(outcome.steps_executed, 5);
        assert!(outcome.state.pending.is_empty());
        assert_eq!(outcome.state.phase, Phase::NeedsCandidates);
    }
}
