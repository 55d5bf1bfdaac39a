//! Reference transport: collaborators backed by external commands.
//!
//! Each call spawns the configured command, writes one JSON request to its
//! stdin and expects one JSON response on stdout. Responses are validated
//! against the embedded schemas before use.

use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::core::consensus::Persona;
use crate::core::creative::CreativeSelector;
use crate::io::collaborator::{
    EvaluationRequest, Evaluator, GenerationRequest, Generator, Proposal, Reaction,
};
use crate::io::process::run_command;
use crate::io::schema::ResponseSchema;

/// Payload written to a generator command's stdin.
#[derive(Serialize)]
struct GenerateCall<'a> {
    kind: &'static str,
    creative: &'a Persona,
    #[serde(flatten)]
    request: &'a GenerationRequest,
}

/// Payload written to an evaluator command's stdin.
#[derive(Serialize)]
struct EvaluateCall<'a> {
    kind: &'static str,
    #[serde(flatten)]
    request: &'a EvaluationRequest,
}

/// Generator that picks a creative per call and delegates to a command.
pub struct CommandGenerator {
    command: Vec<String>,
    selector: Mutex<CreativeSelector>,
    schema: ResponseSchema,
    output_limit_bytes: usize,
}

impl CommandGenerator {
    pub fn new(
        command: Vec<String>,
        selector: CreativeSelector,
        output_limit_bytes: usize,
    ) -> Result<Self> {
        Ok(Self {
            command,
            selector: Mutex::new(selector),
            schema: ResponseSchema::proposal()?,
            output_limit_bytes,
        })
    }

    fn next_creative(&self) -> Result<Persona> {
        let mut selector = self
            .selector
            .lock()
            .map_err(|_| anyhow!("creative selector lock poisoned"))?;
        Ok(selector.next_creative().clone())
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    #[instrument(skip_all, fields(count = request.count))]
    async fn generate(&self, request: &GenerationRequest) -> Result<Proposal> {
        let creative = self.next_creative()?;
        info!(creative = %creative.id, "requesting proposals");
        let payload = serde_json::to_vec(&GenerateCall {
            kind: "generate",
            creative: &creative,
            request,
        })
        .context("serialize generate request")?;
        let stdout = call(&self.command, &payload, self.output_limit_bytes).await?;
        self.schema.parse(&stdout)
    }
}

/// Evaluator that delegates each rater's call to a command.
pub struct CommandEvaluator {
    command: Vec<String>,
    schema: ResponseSchema,
    output_limit_bytes: usize,
}

impl CommandEvaluator {
    pub fn new(command: Vec<String>, output_limit_bytes: usize) -> Result<Self> {
        Ok(Self {
            command,
            schema: ResponseSchema::reaction()?,
            output_limit_bytes,
        })
    }
}

#[async_trait]
impl Evaluator for CommandEvaluator {
    #[instrument(skip_all, fields(rater = %request.rater.id))]
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Reaction> {
        let payload = serde_json::to_vec(&EvaluateCall {
            kind: "evaluate",
            request,
        })
        .context("serialize evaluate request")?;
        let stdout = call(&self.command, &payload, self.output_limit_bytes).await?;
        self.schema.parse(&stdout)
    }
}

async fn call(command: &[String], payload: &[u8], output_limit_bytes: usize) -> Result<Vec<u8>> {
    let output = run_command(command, payload, output_limit_bytes)
        .await
        .with_context(|| format!("run {}", command.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "{} exited with status {:?}: {}",
            command.join(" "),
            output.status.code(),
            output.stderr_tail()
        ));
    }
    if output.stdout_truncated > 0 {
        return Err(anyhow!(
            "{} response exceeded {} bytes",
            command.join(" "),
            output_limit_bytes
        ));
    }
    debug!(bytes = output.stdout.len(), "command response received");
    Ok(output.stdout)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::creative::SelectionStrategy;
    use crate::core::rating::LikertRating;
    use crate::test_support::{objective, persona};

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn generation_request() -> GenerationRequest {
        GenerationRequest {
            objective: objective(),
            prior_best: Vec::new(),
            feedback: Vec::new(),
            learnings: Vec::new(),
            count: 2,
        }
    }

    #[tokio::test]
    async fn generator_parses_command_output() {
        let selector = CreativeSelector::new(
            vec![persona("morgan")],
            SelectionStrategy::RoundRobin,
            None,
        )
        .expect("selector");
        let generator = CommandGenerator::new(
            sh(r#"cat >/dev/null; echo '{"learnings":["short wins"],"candidates":["a","b"]}'"#),
            selector,
            10_000,
        )
        .expect("generator");
        let proposal = generator.generate(&generation_request()).await.expect("generate");
        assert_eq!(proposal.candidates, vec!["a", "b"]);
        assert_eq!(proposal.learnings, vec!["short wins"]);
    }

    #[tokio::test]
    async fn generator_request_carries_the_selected_creative() {
        let selector = CreativeSelector::new(
            vec![persona("morgan")],
            SelectionStrategy::RoundRobin,
            None,
        )
        .expect("selector");
        // Echo back the creative id as the single candidate.
        let script = r#"id=$(sed -n 's/.*"creative":{"id":"\([^"]*\)".*/\1/p'); printf '{"candidates":["%s"]}' "$id""#;
        let generator = CommandGenerator::new(sh(script), selector, 10_000).expect("generator");
        let proposal = generator.generate(&generation_request()).await.expect("generate");
        assert_eq!(proposal.candidates, vec!["morgan"]);
    }

    #[tokio::test]
    async fn evaluator_reports_non_zero_exit() {
        let evaluator =
            CommandEvaluator::new(sh("cat >/dev/null; echo rate limited >&2; exit 1"), 10_000)
                .expect("evaluator");
        let err = evaluator
            .evaluate(&EvaluationRequest {
                objective: objective(),
                rater: persona("alex"),
                candidates: vec!["a".to_string()],
            })
            .await
            .unwrap_err();
        let rendered = format!("{err:#}");
        assert!(rendered.contains("exited with status Some(1)"));
        assert!(rendered.contains("rate limited"));
    }

    #[tokio::test]
    async fn evaluator_parses_reaction() {
        let evaluator = CommandEvaluator::new(
            sh(r#"cat >/dev/null; echo '{"feedback":"ok","ratings":["AGREE"]}'"#),
            10_000,
        )
        .expect("evaluator");
        let reaction = evaluator
            .evaluate(&EvaluationRequest {
                objective: objective(),
                rater: persona("alex"),
                candidates: vec!["a".to_string()],
            })
            .await
            .expect("evaluate");
        assert_eq!(reaction.ratings, vec![LikertRating::Agree]);
        assert_eq!(reaction.feedback, "ok");
    }
}
