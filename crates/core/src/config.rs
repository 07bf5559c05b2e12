// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User configuration loaded from `<base>/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Step labels used when no `[[steps]]` are configured.
pub const DEFAULT_STEPS: [&str; 3] = ["classifying", "planning", "implementing"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// `n` hours, saturating at the largest representable duration.
pub fn hours(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(3600))
}

/// One workflow step executed by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    pub name: String,
    /// Shell command run with `sh -c`; `None` makes the step a no-op.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl StepConfig {
    pub fn noop(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: None,
            timeout_secs: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retention_hours: u64,
    pub stop_timeout_secs: u64,
    pub status_cache_ttl_ms: u64,
    pub handshake_timeout_ms: u64,
    pub steps: Vec<StepConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retention_hours: 24,
            stop_timeout_secs: 30,
            status_cache_ttl_ms: 5000,
            handshake_timeout_ms: 5000,
            steps: Vec::new(),
        }
    }
}

impl Config {
    /// Load `path`, returning defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        };
        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(invalid("step name must not be empty".to_string()));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(invalid(format!("duplicate step '{}'", step.name)));
            }
            if step.timeout_secs == Some(0) {
                return Err(invalid(format!("step '{}' has a zero timeout", step.name)));
            }
        }
        Ok(())
    }

    pub fn retention(&self) -> Duration {
        hours(self.retention_hours)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn status_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.status_cache_ttl_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Configured steps, or the default no-op steps when none are set.
    pub fn effective_steps(&self) -> Vec<StepConfig> {
        if self.steps.is_empty() {
            DEFAULT_STEPS.iter().map(|s| StepConfig::noop(*s)).collect()
        } else {
            self.steps.clone()
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
