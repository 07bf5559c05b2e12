// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk directory layout shared by the CLI and the daemon.
//!
//! ```text
//! <base>/               ~/.cape or $CAPE_DATA_DIR
//!   config.toml
//!   pids/<id>.pid       or $CAPE_RUNTIME_DIR/<id>.pid
//!   state/<id>.json
//!   state/.locks/<id>.lock
//!   logs/<id>.log
//! ```

use crate::env;
use crate::id::WorkflowId;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

const DIR_MODE: u32 = 0o755;

#[derive(Debug, thiserror::Error)]
pub enum PathsError {
    #[error("cannot determine home directory; set CAPE_DATA_DIR")]
    NoHome,
}

/// Resolved directory layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapePaths {
    pub base: PathBuf,
    pub runtime: PathBuf,
    pub state: PathBuf,
    pub logs: PathBuf,
}

impl CapePaths {
    /// Layout rooted at `base` with the default runtime directory.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            runtime: base.join("pids"),
            state: base.join("state"),
            logs: base.join("logs"),
            base,
        }
    }

    pub fn with_runtime_dir(mut self, runtime: impl Into<PathBuf>) -> Self {
        self.runtime = runtime.into();
        self
    }

    /// Resolve from `CAPE_DATA_DIR` / `CAPE_RUNTIME_DIR`, defaulting to `~/.cape`.
    pub fn from_env() -> Result<Self, PathsError> {
        let base = match env::data_dir() {
            Some(dir) => dir,
            None => dirs::home_dir().ok_or(PathsError::NoHome)?.join(".cape"),
        };
        let paths = Self::new(base);
        Ok(match env::runtime_dir() {
            Some(runtime) => paths.with_runtime_dir(runtime),
            None => paths,
        })
    }

    /// Create every directory in the layout. Idempotent.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [&self.base, &self.runtime, &self.state, &self.logs] {
            ensure_dir(dir)?;
        }
        Ok(())
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.toml")
    }

    pub fn pid_file(&self, id: &WorkflowId) -> PathBuf {
        self.runtime.join(format!("{}.pid", id))
    }

    pub fn state_file(&self, id: &WorkflowId) -> PathBuf {
        self.state.join(format!("{}.json", id))
    }

    pub fn log_file(&self, id: &WorkflowId) -> PathBuf {
        self.logs.join(format!("{}.log", id))
    }
}

/// `mkdir -p` with mode 0755.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(dir)
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
