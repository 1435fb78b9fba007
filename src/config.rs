//! Run configuration. Loaded from an optional YAML file; CLI flags override individual keys.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FeedError;

pub const CONFIG_ENV_VAR: &str = "RTFEED_CONFIG";
pub const DEFAULT_TOP_K: usize = 20;
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1000;

/// How the input file lays out its records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Sniff the first non-whitespace byte: `[` selects `Array`, anything else `Ndjson`.
    #[default]
    Auto,
    Array,
    Ndjson,
}

impl InputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Array => "array",
            Self::Ndjson => "ndjson",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to do with a record that cannot be parsed or lacks a required field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Skip the record, log a warning, keep it in the report's issue list.
    #[default]
    Lenient,
    /// Abort the run on the first malformed record.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub format: InputFormat,
    pub policy: MalformedPolicy,
    pub top_k: usize,
    pub progress_interval: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            format: InputFormat::Auto,
            policy: MalformedPolicy::Lenient,
            top_k: DEFAULT_TOP_K,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl FeedConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| FeedError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Self::from_yaml(&raw).map_err(|reason| FeedError::Config {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, String> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(raw).map_err(|err| err.to_string())?;
        if config.top_k == 0 {
            return Err("top_k must be at least 1".to_string());
        }
        Ok(config)
    }

    pub fn is_strict(&self) -> bool {
        self.policy == MalformedPolicy::Strict
    }
}
