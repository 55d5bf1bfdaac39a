//! Refiner configuration stored in `refiner.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::consensus::{Panel, Persona};
use crate::core::creative::SelectionStrategy;
use crate::core::state::{Objective, RefineSettings};

pub const DEFAULT_CONFIG_PATH: &str = "refiner.toml";

/// Refiner configuration (TOML).
///
/// Missing scalar fields default to the values below; the objective, panel,
/// creatives and commands have no useful defaults and must be provided.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefinerConfig {
    /// Minimum consensus score for a candidate to count towards the goal.
    pub min_score: f64,

    /// Number of accepted candidates that satisfies the goal.
    pub required_count: usize,

    /// Number of top candidates shown to the generator.
    pub display_count: usize,

    /// Candidates requested per generation call.
    pub proposals_per_round: usize,

    /// Domain-level cap on generate/evaluate cycles.
    pub max_iterations: u32,

    /// Absolute cap on planner steps, independent of the goal.
    pub max_planner_steps: u32,

    /// Per collaborator call timeout in seconds.
    pub call_timeout_secs: u64,

    /// Maximum bytes kept from a collaborator command's stdout/stderr.
    pub output_limit_bytes: usize,

    pub objective: Objective,
    pub panel: Vec<Persona>,
    pub creatives: Vec<Persona>,
    pub selection: SelectionConfig,
    pub generator: CommandConfig,
    pub evaluator: CommandConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SelectionConfig {
    pub strategy: SelectionStrategy,
    /// Seed for `random`; unseeded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            strategy: SelectionStrategy::Random,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandConfig {
    /// Command to execute (e.g. `["python3", "tools/generate.py"]`).
    pub command: Vec<String>,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            min_score: 0.7,
            required_count: 10,
            display_count: 20,
            proposals_per_round: 10,
            max_iterations: 20,
            max_planner_steps: 1000,
            call_timeout_secs: 120,
            output_limit_bytes: 100_000,
            objective: Objective {
                id: String::new(),
                content: String::new(),
                objective: String::new(),
                deliverable: String::new(),
            },
            panel: Vec::new(),
            creatives: Vec::new(),
            selection: SelectionConfig::default(),
            generator: CommandConfig::default(),
            evaluator: CommandConfig::default(),
        }
    }
}

impl RefinerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(anyhow!("min_score must be within [0, 1]"));
        }
        if self.required_count == 0 {
            return Err(anyhow!("required_count must be > 0"));
        }
        if self.proposals_per_round == 0 {
            return Err(anyhow!("proposals_per_round must be > 0"));
        }
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.max_planner_steps == 0 {
            return Err(anyhow!("max_planner_steps must be > 0"));
        }
        if self.call_timeout_secs == 0 {
            return Err(anyhow!("call_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.objective.objective.trim().is_empty() {
            return Err(anyhow!("objective.objective must be non-empty"));
        }
        Panel::new(self.panel.clone()).map_err(|err| anyhow!("invalid panel: {err}"))?;
        if self.creatives.is_empty() {
            return Err(anyhow!("at least one [[creatives]] entry is required"));
        }
        for (name, cmd) in [("generator", &self.generator), ("evaluator", &self.evaluator)] {
            if cmd.command.is_empty() || cmd.command[0].trim().is_empty() {
                return Err(anyhow!("{name}.command must be a non-empty array"));
            }
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Engine settings derived from this config.
    pub fn settings(&self) -> Result<RefineSettings> {
        let panel = Panel::new(self.panel.clone()).map_err(|err| anyhow!("invalid panel: {err}"))?;
        Ok(RefineSettings {
            objective: self.objective.clone(),
            panel,
            min_score: self.min_score,
            required_count: self.required_count,
            display_count: self.display_count,
            proposals_per_round: self.proposals_per_round,
            max_iterations: self.max_iterations,
        })
    }
}

/// Load and validate config from a TOML file.
pub fn load_config(path: &Path) -> Result<RefinerConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RefinerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RefinerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

/// Starter config written by `refiner init`: a three-person focus group and
/// three creatives refining an anti-smoking billboard slogan.
pub fn sample_config() -> RefinerConfig {
    let persona = |id: &str, name: &str, identity: &str, model: &str, temperature: f64| Persona {
        model: Some(model.to_string()),
        temperature: Some(temperature),
        ..Persona::new(id, name, identity)
    };
    RefinerConfig {
        objective: Objective {
            id: "smoking".to_string(),
            content: "smoking is bad".to_string(),
            objective: "deter smoking".to_string(),
            deliverable: "billboard slogan".to_string(),
        },
        panel: vec![
            persona(
                "participant1",
                "Alex",
                "A 25-year-old urban professional who values directness and clarity",
                "gpt-4o",
                0.7,
            ),
            persona(
                "participant2",
                "Jordan",
                "A 40-year-old parent concerned about health issues affecting youth",
                "gpt-4.1",
                0.3,
            ),
            persona(
                "participant3",
                "Taylor",
                "A 19-year-old college student who responds to emotional appeals",
                "claude-sonnet-4-5",
                1.0,
            ),
        ],
        creatives: vec![
            persona(
                "creative1",
                "Morgan",
                "An advertising professional specializing in impactful public health campaigns",
                "gpt-4o",
                1.2,
            ),
            persona(
                "creative2",
                "Casey",
                "A copywriter with experience in creating concise, memorable slogans",
                "gpt-4.1",
                0.5,
            ),
            persona(
                "creative3",
                "Riley",
                "A behavioral psychologist who understands persuasive messaging techniques",
                "claude-sonnet-4-5",
                0.8,
            ),
        ],
        generator: CommandConfig {
            command: vec!["./tools/generate".to_string()],
        },
        evaluator: CommandConfig {
            command: vec!["./tools/evaluate".to_string()],
        },
        ..RefinerConfig::default()
    }
}
