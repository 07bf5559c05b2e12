// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use cape_core::{Clock, ProcessProbe, WorkflowId};
use cape_storage::{FileOps, PidRegistry, StateStore};
use serde::Serialize;
use std::time::Duration;

/// What a cleanup pass removed or repaired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// PID files whose process was gone
    pub stale: Vec<WorkflowId>,
    /// Non-terminal records without a process, now failed
    pub orphaned: Vec<WorkflowId>,
    /// Terminal workflows past the retention window, now deleted
    pub expired: Vec<WorkflowId>,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.stale.is_empty() && self.orphaned.is_empty() && self.expired.is_empty()
    }
}

/// Stale PID purge, then orphan recovery, then the retention sweep.
///
/// Purging first lets a crashed daemon's record be recovered in the same pass.
pub fn run_cleanup<P, C, W>(
    pids: &PidRegistry<P>,
    store: &StateStore<C, W>,
    max_age: Duration,
) -> CleanupReport
where
    P: ProcessProbe,
    C: Clock,
    W: FileOps,
{
    let report = CleanupReport {
        stale: pids.cleanup_stale(),
        orphaned: pids.recover_orphans(store),
        expired: pids.cleanup_completed(store, max_age),
    };
    tracing::info!(
        stale = report.stale.len(),
        orphaned = report.orphaned.len(),
        expired = report.expired.len(),
        "cleanup finished"
    );
    report
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
