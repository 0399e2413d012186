//! Configuration loading.
//!
//! Environment variables are the source of truth (a `.env` file is loaded
//! by the binary before this runs); an optional `skipper.toml` supplies
//! defaults for the non-secret values. Credentials are environment-only.

use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE: &str = "skipper.toml";

const DEFAULT_MAX_ROUNDS: usize = 24;

/// Resolved gateway configuration.
///
/// All three endpoint values must be present before a session is
/// constructed; a missing one is a fatal startup error, not something the
/// conversation loop ever sees.
#[derive(Debug)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_rounds: usize,
}

/// Shape of `skipper.toml`.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    gateway: GatewaySection,
}

#[derive(Debug, Default, Deserialize)]
struct GatewaySection {
    base_url: Option<String>,
    model: Option<String>,
    max_rounds: Option<usize>,
}

impl Config {
    /// Resolve configuration from the environment and `skipper.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }

    fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = match std::fs::read_to_string(path.as_ref()) {
            Ok(content) => Self::parse(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let api_key = env_var("SKIPPER_API_KEY").ok_or(ConfigError::Missing("SKIPPER_API_KEY"))?;
        let base_url = env_var("SKIPPER_BASE_URL")
            .or(file.gateway.base_url)
            .ok_or(ConfigError::Missing("SKIPPER_BASE_URL"))?;
        let model = env_var("SKIPPER_MODEL")
            .or(file.gateway.model)
            .ok_or(ConfigError::Missing("SKIPPER_MODEL"))?;

        let max_rounds = match env_var("SKIPPER_MAX_ROUNDS") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "SKIPPER_MAX_ROUNDS",
                value,
            })?,
            None => file.gateway.max_rounds.unwrap_or(DEFAULT_MAX_ROUNDS),
        };

        Ok(Self {
            api_key,
            base_url,
            model,
            max_rounds,
        })
    }

    fn parse(toml_str: &str) -> Result<FileConfig, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read skipper.toml: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse skipper.toml: {0}")]
    Parse(String),

    #[error("missing required configuration: {0} (set it in the environment or .env)")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
