// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launching processes that outlive their parent.

use cape_core::ProcessId;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn {program}: {source}")]
    Io {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("spawned {program} has no usable pid")]
    NoPid { program: PathBuf },
}

/// Starts a process detached from the caller's terminal and process group.
pub trait ProcessSpawner: Clone + Send + Sync + 'static {
    fn spawn_detached(&self, program: &Path, args: &[String]) -> Result<ProcessId, SpawnError>;
}

/// Spawns into a new process group with stdio on `/dev/null`.
///
/// The child is waited on from a background thread so a long-lived caller
/// never accumulates zombies; the wait returns as soon as the child exits.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedSpawner;

impl ProcessSpawner for DetachedSpawner {
    fn spawn_detached(&self, program: &Path, args: &[String]) -> Result<ProcessId, SpawnError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|source| SpawnError::Io {
                program: program.to_path_buf(),
                source,
            })?;

        let Ok(pid) = ProcessId::try_from(child.id()) else {
            let _ = child.kill();
            return Err(SpawnError::NoPid {
                program: program.to_path_buf(),
            });
        };

        let reaper = std::thread::Builder::new()
            .name("cape-reaper".to_string())
            .spawn(move || {
                if let Err(e) = child.wait() {
                    tracing::debug!(pid, error = %e, "wait on detached child failed");
                }
            });
        if let Err(e) = reaper {
            tracing::warn!(pid, error = %e, "failed to start reaper thread");
        }

        tracing::info!(pid, program = %program.display(), "spawned detached process");
        Ok(pid)
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
