//! Environment-driven configuration and the built-in participant roster.

use std::path::PathBuf;
use std::sync::Arc;

use crate::llm::{gemini, Generator};
use crate::participant::{Participant, ParticipantRegistry};

/// Topic used when a start request carries none.
pub const DEFAULT_TOPIC: &str = "How do we make progress on the current goals?";

/// Runtime configuration, resolved from the environment with defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP port (`PORT`, default 8080).
    pub port: u16,
    /// Data directory for the durable store (`ROUNDTABLE_DATA_DIR`, default `./data`).
    pub data_dir: PathBuf,
    /// Gemini model name (`ROUNDTABLE_MODEL`).
    pub model: String,
    /// Round cap per discussion session (`ROUNDTABLE_MAX_ROUNDS`, default 10).
    pub max_rounds: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: PathBuf::from("./data"),
            model: gemini::DEFAULT_MODEL.to_string(),
            max_rounds: 10,
        }
    }
}

impl Config {
    /// Resolve configuration from environment variables.
    ///
    /// Unparsable values fall back to the default with a warning rather
    /// than failing startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parse_var("PORT", defaults.port),
            data_dir: std::env::var("ROUNDTABLE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            model: std::env::var("ROUNDTABLE_MODEL").unwrap_or(defaults.model),
            max_rounds: parse_var("ROUNDTABLE_MAX_ROUNDS", defaults.max_rounds),
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("invalid {name}={raw}, using default {default}");
                default
            }
        },
        Err(_) => default,
    }
}

/// A roster role definition.
#[derive(Debug, Clone, Copy)]
pub struct RoleDef {
    /// Participant name (transcript sender identifier).
    pub name: &'static str,
    /// Role description handed to the generation capability.
    pub description: &'static str,
    /// Whether this role rewrites the strategy document.
    pub writes_strategy: bool,
}

/// The built-in roster, in speaking order. The Refiner is the designated
/// strategy writer.
pub const DEFAULT_ROSTER: &[RoleDef] = &[
    RoleDef {
        name: "Explorer",
        description: "You are the Explorer. Propose bold, unconventional directions \
            and surface options nobody else would. Prefer concrete suggestions over \
            generalities, and keep every point short.",
        writes_strategy: false,
    },
    RoleDef {
        name: "Critic",
        description: "You are the Critic. Probe every proposal for risks, hidden \
            costs, and failure points. Stay constructive: pair each objection with \
            what would resolve it. Keep responses brief.",
        writes_strategy: false,
    },
    RoleDef {
        name: "Synthesizer",
        description: "You are the Synthesizer. Combine the strongest ideas raised so \
            far into one coherent, practical direction, resolving conflicts between \
            proposals. Keep the result actionable.",
        writes_strategy: false,
    },
    RoleDef {
        name: "Refiner",
        description: "You are the Refiner. Rewrite the full strategy document so it \
            reflects the best of the discussion so far. Output only the document \
            text itself: clear, concise, actionable steps.",
        writes_strategy: true,
    },
];

/// Build the participant registry from the built-in roster, with every
/// participant backed by the same generation capability.
pub fn build_registry(generator: Arc<dyn Generator>) -> ParticipantRegistry {
    ParticipantRegistry::new(
        DEFAULT_ROSTER
            .iter()
            .map(|role| Participant {
                name: role.name.to_string(),
                role: role.description.to_string(),
                generator: generator.clone(),
                writes_strategy: role.writes_strategy,
            })
            .collect(),
    )
}
