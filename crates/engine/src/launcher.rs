// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Starting and stopping workflow daemons.
//!
//! Launch order is spawn, then PID file, then initial state record. The
//! daemon waits for its state record before doing any work, so a launch that
//! fails half-way can kill the process and remove what was written without
//! racing it.

use crate::error::LaunchError;
use cape_adapters::{ProcessSpawner, TerminationController};
use cape_core::{
    CapePaths, Clock, IdGen, ProcessId, ProcessProbe, ShortUuidIdGen, Signal, StatePatch,
    SystemClock, WorkflowId, WorkflowState, WorkflowStatus,
};
use cape_storage::{FsFileOps, PidRegistry, StateStore, StorageError};
use std::path::PathBuf;
use std::time::Duration;

pub struct WorkflowLauncher<S, P, C = SystemClock, G = ShortUuidIdGen>
where
    S: ProcessSpawner,
    P: ProcessProbe,
    C: Clock,
    G: IdGen,
{
    paths: CapePaths,
    daemon: PathBuf,
    spawner: S,
    probe: P,
    pids: PidRegistry<P>,
    store: StateStore<C, FsFileOps>,
    terminator: TerminationController<P>,
    ids: G,
}

impl<S: ProcessSpawner, P: ProcessProbe> WorkflowLauncher<S, P> {
    pub fn new(paths: CapePaths, daemon: impl Into<PathBuf>, spawner: S, probe: P) -> Self {
        Self::with_parts(paths, daemon, spawner, probe, SystemClock, ShortUuidIdGen)
    }
}

impl<S, P, C, G> WorkflowLauncher<S, P, C, G>
where
    S: ProcessSpawner,
    P: ProcessProbe,
    C: Clock,
    G: IdGen,
{
    pub fn with_parts(
        paths: CapePaths,
        daemon: impl Into<PathBuf>,
        spawner: S,
        probe: P,
        clock: C,
        ids: G,
    ) -> Self {
        Self {
            pids: PidRegistry::new(&paths.runtime, probe.clone()),
            store: StateStore::with_parts(&paths.state, clock, FsFileOps),
            terminator: TerminationController::new(probe.clone()),
            daemon: daemon.into(),
            paths,
            spawner,
            probe,
            ids,
        }
    }

    pub fn paths(&self) -> &CapePaths {
        &self.paths
    }

    pub fn pids(&self) -> &PidRegistry<P> {
        &self.pids
    }

    pub fn store(&self) -> &StateStore<C, FsFileOps> {
        &self.store
    }

    /// Daemon command line for workflow `id`.
    fn daemon_args(&self, issue_id: i64, id: &WorkflowId) -> Vec<String> {
        vec![
            issue_id.to_string(),
            id.to_string(),
            "--data-dir".to_string(),
            self.paths.base.display().to_string(),
            "--runtime-dir".to_string(),
            self.paths.runtime.display().to_string(),
        ]
    }

    /// Spawn a daemon for `issue_id` and record it.
    pub fn launch(&self, issue_id: i64) -> Result<WorkflowId, LaunchError> {
        self.paths.ensure().map_err(|source| LaunchError::Layout {
            path: self.paths.base.clone(),
            source,
        })?;

        let id = self.ids.next();
        let pid = self
            .spawner
            .spawn_detached(&self.daemon, &self.daemon_args(issue_id, &id))?;

        if let Err(source) = self.record(&id, issue_id, pid) {
            tracing::error!(workflow_id = %id, pid, error = %source, "launch failed after spawn");
            self.abandon(&id, pid);
            return Err(LaunchError::Record {
                workflow_id: id,
                source,
            });
        }

        tracing::info!(workflow_id = %id, issue_id, pid, "launched workflow");
        Ok(id)
    }

    fn record(&self, id: &WorkflowId, issue_id: i64, pid: ProcessId) -> Result<(), StorageError> {
        self.pids.write(id, pid)?;
        let state = WorkflowState::new(id.clone(), issue_id, pid, self.store.clock().now());
        self.store.write(&state)
    }

    /// Undo a partial launch.
    fn abandon(&self, id: &WorkflowId, pid: ProcessId) {
        self.probe.send(pid, Signal::Kill);
        if let Err(e) = self.pids.delete(id) {
            tracing::warn!(workflow_id = %id, error = %e, "failed to remove pid file");
        }
        if let Err(e) = self.store.delete(id) {
            tracing::warn!(workflow_id = %id, error = %e, "failed to remove state file");
        }
    }

    /// Stop a workflow: mark it stopped, terminate its process, and drop
    /// its PID file.
    ///
    /// Returns `false` when no PID file exists or the process survived.
    pub async fn stop(&self, id: &WorkflowId, timeout: Duration) -> bool {
        let Some(pid) = self.pids.read(id) else {
            tracing::debug!(workflow_id = %id, "no pid file; nothing to stop");
            return false;
        };

        match self.store.update(id, &StatePatch::status(WorkflowStatus::Stopped)) {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(workflow_id = %id, "no state record to mark stopped"),
            Err(StorageError::Transition(e)) => {
                tracing::debug!(workflow_id = %id, error = %e, "keeping final status")
            }
            Err(e) => tracing::warn!(workflow_id = %id, error = %e, "failed to mark workflow stopped"),
        }

        let stopped = self.terminator.terminate(pid, timeout).await;

        if let Err(e) = self.pids.delete(id) {
            tracing::warn!(workflow_id = %id, error = %e, "failed to remove pid file");
        }
        if stopped {
            tracing::info!(workflow_id = %id, pid, "stopped workflow");
        } else {
            tracing::warn!(workflow_id = %id, pid, "workflow process did not exit");
        }
        stopped
    }

    /// The workflow's pid, only if its process is alive.
    pub fn pid_of(&self, id: &WorkflowId) -> Option<ProcessId> {
        self.pids.read(id).filter(|pid| self.probe.is_alive(*pid))
    }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
