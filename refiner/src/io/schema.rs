//! JSON Schema validation for collaborator responses.

use anyhow::{Context, Result, bail};
use jsonschema::{Draft, Validator};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub const PROPOSAL_SCHEMA: &str = include_str!("../../schemas/proposal.schema.json");
pub const REACTION_SCHEMA: &str = include_str!("../../schemas/reaction.schema.json");

/// A compiled schema (Draft 2020-12) for one response type.
pub struct ResponseSchema {
    name: &'static str,
    validator: Validator,
}

impl ResponseSchema {
    pub fn compile(name: &'static str, raw: &str) -> Result<Self> {
        let schema: Value =
            serde_json::from_str(raw).with_context(|| format!("parse {name} schema"))?;
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema)
            .with_context(|| format!("compile {name} schema"))?;
        Ok(Self { name, validator })
    }

    pub fn proposal() -> Result<Self> {
        Self::compile("proposal", PROPOSAL_SCHEMA)
    }

    pub fn reaction() -> Result<Self> {
        Self::compile("reaction", REACTION_SCHEMA)
    }

    /// Parse `raw`, validate it, then deserialize into `T`.
    pub fn parse<T: DeserializeOwned>(&self, raw: &[u8]) -> Result<T> {
        let instance: Value = serde_json::from_slice(raw)
            .with_context(|| format!("parse {} response json", self.name))?;
        let messages: Vec<String> = self
            .validator
            .iter_errors(&instance)
            .map(|err| err.to_string())
            .collect();
        if !messages.is_empty() {
            bail!(
                "{} response failed schema validation:\n- {}",
                self.name,
                messages.join("\n- ")
            );
        }
        serde_json::from_value(instance).with_context(|| format!("decode {} response", self.name))
    }
}
