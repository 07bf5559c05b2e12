// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-mostly queries over running and finished workflows.

use crate::error::WaitError;
use crate::log_tail::tail_lines;
use crate::status_cache::StatusCache;
use cape_core::{
    format_hms, CapePaths, Clock, ProcessProbe, SystemClock, WorkflowId, WorkflowState,
    WorkflowStatus,
};
use cape_storage::{FsFileOps, PidRegistry, StateStore};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Default interval between checks in [`WorkflowMonitor::wait`].
pub const DEFAULT_WAIT_POLL: Duration = Duration::from_secs(1);

/// Human-oriented summary of a workflow's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowProgress {
    pub workflow_id: WorkflowId,
    pub status: WorkflowStatus,
    pub current_step: Option<String>,
    pub elapsed_seconds: u64,
    /// `H:MM:SS`
    pub elapsed: String,
    pub error_message: Option<String>,
}

pub struct WorkflowMonitor<P: ProcessProbe, C: Clock = SystemClock> {
    paths: CapePaths,
    pids: PidRegistry<P>,
    store: StateStore<C, FsFileOps>,
    cache: StatusCache,
}

impl<P: ProcessProbe> WorkflowMonitor<P> {
    pub fn new(paths: CapePaths, probe: P) -> Self {
        Self::with_parts(paths, probe, SystemClock, crate::status_cache::DEFAULT_TTL)
    }
}

impl<P: ProcessProbe, C: Clock> WorkflowMonitor<P, C> {
    pub fn with_parts(paths: CapePaths, probe: P, clock: C, cache_ttl: Duration) -> Self {
        Self {
            pids: PidRegistry::new(&paths.runtime, probe),
            store: StateStore::with_parts(&paths.state, clock, FsFileOps),
            cache: StatusCache::new(cache_ttl),
            paths,
        }
    }

    pub fn store(&self) -> &StateStore<C, FsFileOps> {
        &self.store
    }

    pub fn pids(&self) -> &PidRegistry<P> {
        &self.pids
    }

    /// Current record for `id`.
    ///
    /// With `use_cache` a fresh cached record is returned without touching
    /// disk. Without it the disk is read and the cache refreshed.
    pub fn status(&self, id: &WorkflowId, use_cache: bool) -> Option<WorkflowState> {
        if use_cache {
            if let Some(state) = self.cache.get(id) {
                return Some(state);
            }
        }
        let state = self.store.read(id);
        match &state {
            Some(state) => self.cache.put(state.clone()),
            None => self.cache.remove(id),
        }
        state
    }

    /// Records of workflows whose process is alive, oldest first.
    pub fn list_active(&self) -> Vec<WorkflowState> {
        let mut active: Vec<WorkflowState> = self
            .pids
            .list()
            .into_iter()
            .filter_map(|(id, _)| self.status(&id, false))
            .collect();
        active.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.workflow_id.cmp(&b.workflow_id))
        });
        active
    }

    pub fn is_running(&self, id: &WorkflowId) -> bool {
        self.pids
            .read(id)
            .is_some_and(|pid| self.pids.probe().is_alive(pid))
    }

    /// Last `lines` lines of the workflow's log; `None` if there is no log.
    pub fn logs(&self, id: &WorkflowId, lines: usize) -> Option<Vec<String>> {
        if !WorkflowId::is_valid(id.as_str()) {
            return None;
        }
        tail_lines(&self.paths.log_file(id), lines)
    }

    /// Poll until the workflow reaches a terminal status.
    ///
    /// `timeout` of `None` waits forever. A record that never appears is
    /// [`WaitError::NotFound`]; one that appears but never finishes is
    /// [`WaitError::Timeout`].
    pub async fn wait(
        &self,
        id: &WorkflowId,
        timeout: Option<Duration>,
        poll_interval: Duration,
    ) -> Result<WorkflowState, WaitError> {
        let started = Instant::now();
        let deadline = timeout.map(|t| started + t);
        let mut seen = false;
        loop {
            if let Some(state) = self.status(id, false) {
                if state.is_terminal() {
                    return Ok(state);
                }
                seen = true;
            }
            let now = Instant::now();
            if let Some(deadline) = deadline {
                if now >= deadline {
                    return Err(if seen {
                        WaitError::Timeout {
                            workflow_id: id.clone(),
                            waited: now - started,
                        }
                    } else {
                        WaitError::NotFound(id.clone())
                    });
                }
                tokio::time::sleep(poll_interval.min(deadline - now)).await;
            } else {
                tokio::time::sleep(poll_interval).await;
            }
        }
    }

    /// Elapsed-time summary. A finished workflow's clock stops at its last
    /// update.
    pub fn progress(&self, id: &WorkflowId) -> Option<WorkflowProgress> {
        let state = self.status(id, false)?;
        let end = if state.is_terminal() {
            state.updated_at
        } else {
            self.store.clock().now()
        };
        let elapsed_seconds = state.elapsed_secs(end);
        Some(WorkflowProgress {
            workflow_id: state.workflow_id,
            status: state.status,
            current_step: state.current_step,
            elapsed_seconds,
            elapsed: format_hms(elapsed_seconds),
            error_message: state.error_message,
        })
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
