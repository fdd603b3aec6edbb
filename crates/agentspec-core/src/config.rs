// ABOUTME: Engine configuration read from AGENTSPEC_* environment variables.
// ABOUTME: Produces default save and load options for callers such as the CLI.

use thiserror::Error;

use crate::deserialize::LoadOptions;
use crate::limits::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_INPUT_SIZE};
use crate::naming::NamingMode;
use crate::serialize::SaveOptions;
use crate::version::AgentSpecVersion;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("AGENTSPEC_NAMING must be canonical or alternate, got {0:?}")]
    InvalidNaming(String),

    #[error("AGENTSPEC_TARGET_VERSION is not a known version: {0:?}")]
    InvalidVersion(String),

    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidLimit { name: &'static str, value: String },
}

/// Defaults shared by every save and load in one process.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub naming: NamingMode,
    pub target_version: AgentSpecVersion,
    pub max_input_size: usize,
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            naming: NamingMode::default(),
            target_version: AgentSpecVersion::CURRENT,
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - AGENTSPEC_NAMING: `canonical` or `alternate` (default: canonical)
    /// - AGENTSPEC_TARGET_VERSION: version written on save (default: current)
    /// - AGENTSPEC_MAX_INPUT_SIZE: largest accepted document, in bytes (default: 16 MiB)
    /// - AGENTSPEC_MAX_DEPTH: deepest accepted nesting (default: 64)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let naming: NamingMode = match get("AGENTSPEC_NAMING") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidNaming(v))?,
            None => defaults.naming,
        };

        let target_version: AgentSpecVersion = match get("AGENTSPEC_TARGET_VERSION") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidVersion(v))?,
            None => defaults.target_version,
        };

        let max_input_size = match get("AGENTSPEC_MAX_INPUT_SIZE") {
            Some(v) => parse_limit("AGENTSPEC_MAX_INPUT_SIZE", v)?,
            None => defaults.max_input_size,
        };

        let max_depth = match get("AGENTSPEC_MAX_DEPTH") {
            Some(v) => parse_limit("AGENTSPEC_MAX_DEPTH", v)?,
            None => defaults.max_depth,
        };

        Ok(Self {
            naming,
            target_version,
            max_input_size,
            max_depth,
        })
    }

    pub fn save_options(&self) -> SaveOptions {
        SaveOptions::default()
            .with_naming(self.naming)
            .with_target_version(self.target_version)
            .with_max_depth(self.max_depth)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions::default()
            .with_naming(self.naming)
            .with_max_input_size(self.max_input_size)
            .with_max_depth(self.max_depth)
    }
}

fn parse_limit(name: &'static str, value: String) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidLimit { name, value }),
    }
}
