//! Loop-level tests for full refinement runs.
//!
//! These tests drive `run_refinement` through several generate/evaluate
//! cycles with scripted collaborators to verify end-to-end behavior: scoring,
//! retention, what the generator sees between rounds, and every way a run
//! can stop.

use std::time::Duration;

use refiner::core::error::EngineError;
use refiner::core::planner::{PlanStop, StepReport};
use refiner::core::rating::LikertRating;
use refiner::core::state::Phase;
use refiner::exit_codes;
use refiner::refine::{EVALUATE, GENERATE, run_refinement};
use refiner::test_support::{
    ScriptedEvaluator, ScriptedGenerator, collaborators, proposal, settings,
};
use tokio_util::sync::CancellationToken;

/// Round 1 proposes `weak` and `strong`; `r0` loves `strong`, `r1` is
/// neutral, so only `strong` clears 0.7. Round 2 proposes a single candidate
/// but `r0` is scripted to return two ratings, which must abort the run with
/// round 1's results intact.
#[tokio::test]
async fn rating_count_mismatch_aborts_second_round() {
    let generator = ScriptedGenerator::new(vec![
        proposal(&["weak", "strong"]),
        proposal(&["better"]),
    ]);
    let evaluator = ScriptedEvaluator::uniform(LikertRating::Neutral)
        .with_ratings("r0", vec![LikertRating::Neutral, LikertRating::StronglyAgree]);
    let ctx = collaborators(generator, evaluator);

    let mut reports: Vec<StepReport> = Vec::new();
    let outcome = run_refinement(settings(2), 100, &ctx, &CancellationToken::new(), |r, _| {
        reports.push(r.clone());
    })
    .await;

    let err = outcome.unwrap_err();
    assert!(matches!(err.source, EngineError::MalformedInput(_)));
    assert_eq!(err.action, EVALUATE);
    let actions: Vec<&str> = reports.iter().map(|r| r.action).collect();
    assert_eq!(actions, vec![GENERATE, EVALUATE, GENERATE]);
    // The state handed back still holds round 1's results.
    let texts: Vec<&str> = err.state.best.entries().iter().map(|e| e.text()).collect();
    assert_eq!(texts, vec!["strong", "weak"]);
    assert_eq!(err.state.best.entries()[0].score(), 0.75);
    assert_eq!(err.state.pending, vec!["better"]);
}

#[tokio::test]
async fn uniform_panel_reaches_goal_and_feeds_back_to_generator() {
    let generator = ScriptedGenerator::new(vec![proposal(&["a"]), proposal(&["b", "c"])]);
    let ctx = collaborators(
        generator.clone(),
        ScriptedEvaluator::uniform(LikertRating::Agree),
    );

    let outcome = run_refinement(settings(3), 100, &ctx, &CancellationToken::new(), |_, _| {})
        .await
        .expect("run");

    assert_eq!(outcome.stop, PlanStop::GoalReached);
    assert_eq!(exit_codes::for_outcome(&outcome), exit_codes::OK);
    assert_eq!(outcome.steps_executed, 4);
    assert_eq!(outcome.state.iteration, 2);
    assert_eq!(outcome.state.phase, Phase::NeedsCandidates);
    assert!(outcome.state.pending.is_empty());
    let scores: Vec<f64> = outcome.state.best.entries().iter().map(|e| e.score()).collect();
    assert_eq!(scores, vec![0.75, 0.75, 0.75]);
    // Ties keep insertion order.
    assert_eq!(outcome.state.result()[0].text(), "a");

    let requests = generator.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].prior_best.is_empty());
    assert!(requests[0].feedback.is_empty());
    assert_eq!(requests[1].prior_best.len(), 1);
    assert_eq!(requests[1].prior_best[0].text(), "a");
    assert_eq!(
        requests[1].feedback,
        vec![
            "r0 name: feedback from r0",
            "r1 name: feedback from r1",
            "r2 name: feedback from r2",
        ]
    );
    assert_eq!(requests[1].count, 3);
}

#[tokio::test]
async fn domain_iteration_cap_bounds_cycles() {
    let mut settings = settings(2);
    settings.max_iterations = 4;
    let generator = ScriptedGenerator::repeating(proposal(&["meh"]));
    let ctx = collaborators(generator.clone(), ScriptedEvaluator::uniform(LikertRating::Disagree));

    let outcome = run_refinement(settings, 1000, &ctx, &CancellationToken::new(), |_, _| {})
        .await
        .expect("run");

    assert_eq!(outcome.stop, PlanStop::GoalReached);
    assert_eq!(outcome.state.iteration, 4);
    assert!(generator.requests().len() <= 4);
    assert!(outcome.state.accepted().is_empty());
    assert!(outcome.state.pending.is_empty());
    // The budget ran out, so this is not a trustworthy result.
    assert_eq!(exit_codes::for_outcome(&outcome), exit_codes::EXHAUSTED);
}

#[tokio::test]
async fn planner_ceiling_supersedes_domain_cap() {
    let mut settings = settings(2);
    settings.max_iterations = 1000;
    let generator = ScriptedGenerator::repeating(proposal(&["meh"]));
    let ctx = collaborators(generator, ScriptedEvaluator::uniform(LikertRating::Disagree));

    let outcome = run_refinement(settings, 6, &ctx, &CancellationToken::new(), |_, _| {})
        .await
        .expect("run");

    assert_eq!(outcome.stop, PlanStop::SafetyBoundReached { max_steps: 6 });
    assert_eq!(outcome.steps_executed, 6);
    assert_eq!(outcome.state.iteration, 3);
}

#[tokio::test]
async fn failing_rater_leaves_store_as_it_was() {
    let generator = ScriptedGenerator::new(vec![proposal(&["a"]), proposal(&["b"])]);
    let evaluator = ScriptedEvaluator::uniform(LikertRating::StronglyAgree);
    let ctx = collaborators(generator, evaluator.failing_for("r2"));

    let err = run_refinement(settings(3), 100, &ctx, &CancellationToken::new(), |_, _| {})
        .await
        .unwrap_err();

    assert_eq!(err.action, EVALUATE);
    assert!(err.state.best.is_empty());
    assert_eq!(err.state.pending, vec!["a"]);
    assert!(err.to_string().contains("evaluator[r2] failed"));
}

#[tokio::test]
async fn cancellation_stops_in_flight_evaluation() {
    let generator = ScriptedGenerator::repeating(proposal(&["a"]));
    let evaluator = ScriptedEvaluator::uniform(LikertRating::Agree).hanging_for("r1");
    let ctx = collaborators(generator, evaluator.clone());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = run_refinement(settings(2), 100, &ctx, &cancel, |_, _| {})
        .await
        .expect("run");

    assert_eq!(outcome.stop, PlanStop::Cancelled);
    assert_eq!(outcome.steps_executed, 1);
    assert_eq!(outcome.state.phase, Phase::AwaitingEvaluation);
    assert!(outcome.state.best.is_empty());
    assert_eq!(evaluator.calls_for("r1"), 0);
}
