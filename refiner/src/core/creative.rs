//! Selection of the creative persona used for each generation call.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::consensus::Persona;
use crate::core::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Cycle through creatives in declaration order.
    RoundRobin,
    /// Pick uniformly at random; deterministic when a seed is given.
    Random,
}

enum Picker {
    RoundRobin { next: usize },
    Random(StdRng),
}

/// Injected persona picker handed to a generation collaborator.
pub struct CreativeSelector {
    creatives: Vec<Persona>,
    picker: Picker,
}

impl CreativeSelector {
    pub fn new(
        creatives: Vec<Persona>,
        strategy: SelectionStrategy,
        seed: Option<u64>,
    ) -> Result<Self, EngineError> {
        if creatives.is_empty() {
            return Err(EngineError::malformed("at least one creative is required"));
        }
        let picker = match strategy {
            SelectionStrategy::RoundRobin => Picker::RoundRobin { next: 0 },
            SelectionStrategy::Random => Picker::Random(match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            }),
        };
        Ok(Self { creatives, picker })
    }

    pub fn creatives(&self) -> &[Persona] {
        &self.creatives
    }

    pub fn next_creative(&mut self) -> &Persona {
        let index = match &mut self.picker {
            Picker::RoundRobin { next } => {
                let index = *next;
                *next = (index + 1) % self.creatives.len();
                index
            }
            Picker::Random(rng) => rng.gen_range(0..self.creatives.len()),
        };
        &self.creatives[index]
    }
}
