// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PID files binding workflow ids to OS processes.
//!
//! `<dir>/<id>.pid` holds the daemon's pid as decimal text. Together with
//! the [`StateStore`] this is all a fresh supervisor needs to rediscover
//! running workflows and repair what a crash left behind:
//!
//! - a PID file whose process is gone is *stale* and gets deleted;
//! - a non-terminal state record without a PID file is *orphaned* and gets
//!   marked failed;
//! - terminal records past the retention window are swept.

use crate::atomic::{write_atomic, FileOps, FsFileOps};
use crate::state_store::{remove_if_exists, scan_ids};
use crate::{StateStore, StorageError};
use cape_core::paths::ensure_dir;
use cape_core::{
    Clock, ProcessId, ProcessProbe, StatePatch, TransitionError, WorkflowId, WorkflowState,
    ORPHANED_MESSAGE,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A live workflow found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredWorkflow {
    pub workflow_id: WorkflowId,
    pub pid: ProcessId,
    /// `None` when the state record is missing or unreadable
    pub state: Option<WorkflowState>,
}

#[derive(Clone)]
pub struct PidRegistry<P: ProcessProbe, W: FileOps = FsFileOps> {
    dir: PathBuf,
    probe: P,
    ops: W,
}

impl<P: ProcessProbe> PidRegistry<P> {
    pub fn new(dir: impl Into<PathBuf>, probe: P) -> Self {
        Self::with_ops(dir, probe, FsFileOps)
    }
}

impl<P: ProcessProbe, W: FileOps> PidRegistry<P, W> {
    pub fn with_ops(dir: impl Into<PathBuf>, probe: P, ops: W) -> Self {
        Self {
            dir: dir.into(),
            probe,
            ops,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn path(&self, id: &WorkflowId) -> PathBuf {
        self.dir.join(format!("{}.pid", id))
    }

    pub fn write(&self, id: &WorkflowId, pid: ProcessId) -> Result<(), StorageError> {
        if !WorkflowId::is_valid(id.as_str()) {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        if pid <= 0 {
            return Err(StorageError::InvalidPid(pid));
        }
        ensure_dir(&self.dir).map_err(StorageError::io(&self.dir))?;
        write_atomic(&self.ops, &self.path(id), pid.to_string().as_bytes())
    }

    /// The recorded pid, without checking liveness.
    pub fn read(&self, id: &WorkflowId) -> Option<ProcessId> {
        if !WorkflowId::is_valid(id.as_str()) {
            return None;
        }
        let path = self.path(id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read pid file");
                return None;
            }
        };
        match content.trim().parse::<ProcessId>() {
            Ok(pid) if pid > 0 => Some(pid),
            _ => {
                tracing::warn!(path = %path.display(), content = %content.trim(), "skipping corrupt pid file");
                None
            }
        }
    }

    pub fn delete(&self, id: &WorkflowId) -> Result<bool, StorageError> {
        if !WorkflowId::is_valid(id.as_str()) {
            return Ok(false);
        }
        remove_if_exists(&self.path(id))
    }

    /// Every PID file, with its pid if readable.
    pub fn entries(&self) -> Vec<(WorkflowId, Option<ProcessId>)> {
        scan_ids(&self.dir, "pid")
            .into_iter()
            .map(|id| {
                let pid = self.read(&id);
                (id, pid)
            })
            .collect()
    }

    /// Entries whose process is alive.
    pub fn list(&self) -> Vec<(WorkflowId, ProcessId)> {
        self.entries()
            .into_iter()
            .filter_map(|(id, pid)| pid.map(|pid| (id, pid)))
            .filter(|(_, pid)| self.probe.is_alive(*pid))
            .collect()
    }

    /// Delete PID files whose process is dead or whose content is unreadable.
    pub fn cleanup_stale(&self) -> Vec<WorkflowId> {
        let mut removed = Vec::new();
        for (id, pid) in self.entries() {
            if pid.is_some_and(|pid| self.probe.is_alive(pid)) {
                continue;
            }
            match self.delete(&id) {
                Ok(_) => {
                    tracing::info!(workflow_id = %id, pid = ?pid, "removed stale pid file");
                    removed.push(id);
                }
                Err(e) => {
                    tracing::warn!(workflow_id = %id, error = %e, "failed to remove stale pid file");
                }
            }
        }
        removed
    }

    /// Live workflows paired with their state records.
    pub fn discover<C: Clock, S: FileOps>(
        &self,
        store: &StateStore<C, S>,
    ) -> Vec<DiscoveredWorkflow> {
        self.list()
            .into_iter()
            .map(|(workflow_id, pid)| DiscoveredWorkflow {
                state: store.read(&workflow_id),
                workflow_id,
                pid,
            })
            .collect()
    }

    /// Mark every non-terminal record without a PID file as failed.
    pub fn recover_orphans<C: Clock, S: FileOps>(
        &self,
        store: &StateStore<C, S>,
    ) -> Vec<WorkflowId> {
        let mut recovered = Vec::new();
        for state in store.list() {
            let id = &state.workflow_id;
            if state.is_terminal() || self.path(id).exists() {
                continue;
            }
            match store.update(id, &StatePatch::failed(ORPHANED_MESSAGE)) {
                Ok(Some(_)) => {
                    tracing::info!(workflow_id = %id, previous = %state.status, "recovered orphaned workflow");
                    recovered.push(id.clone());
                }
                Ok(None) => {}
                // Finished between the scan and the update
                Err(StorageError::Transition(TransitionError::Terminal { .. })) => {}
                Err(e) => {
                    tracing::warn!(workflow_id = %id, error = %e, "failed to recover orphaned workflow");
                }
            }
        }
        recovered
    }

    /// Delete PID and state files of terminal workflows last updated more
    /// than `max_age` ago.
    pub fn cleanup_completed<C: Clock, S: FileOps>(
        &self,
        store: &StateStore<C, S>,
        max_age: Duration,
    ) -> Vec<WorkflowId> {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = store
            .clock()
            .now()
            .checked_sub_signed(max_age)
            .unwrap_or(chrono::NaiveDateTime::MIN);

        let mut cleaned = Vec::new();
        for state in store.list() {
            if !state.is_terminal() || state.updated_at >= cutoff {
                continue;
            }
            let id = state.workflow_id;
            let result = self.delete(&id).and_then(|_| store.delete(&id));
            match result {
                Ok(_) => {
                    tracing::info!(workflow_id = %id, status = %state.status, "removed expired workflow");
                    if let Err(e) = store.remove_lock(&id) {
                        tracing::warn!(workflow_id = %id, error = %e, "failed to remove lock file");
                    }
                    cleaned.push(id);
                }
                Err(e) => {
                    tracing::warn!(workflow_id = %id, error = %e, "failed to remove expired workflow");
                }
            }
        }
        cleaned
    }
}

#[cfg(test)]
#[path = "pid_registry_tests.rs"]
mod tests;
