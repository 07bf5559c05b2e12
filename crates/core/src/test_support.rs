// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{ProcessId, ProcessInfo, ProcessProbe, Signal, WorkflowId, WorkflowState, WorkflowStatus};
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

// ── State factories ─────────────────────────────────────────────────────────

/// 2024-03-15 at the given wall-clock time.
pub fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .and_then(|d| d.and_hms_opt(h, m, s))
        .unwrap_or_default()
}

/// Record started at 10:00:00 with pid 4242.
pub fn sample_state(id: &str, status: WorkflowStatus) -> WorkflowState {
    let mut state = WorkflowState::new(WorkflowId::new(id), 42, 4242, ts(10, 0, 0));
    state.status = status;
    state
}

// ── FakeProcessProbe ────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeProcesses {
    alive: HashSet<ProcessId>,
    ignores_terminate: HashSet<ProcessId>,
    signals: Vec<(ProcessId, Signal)>,
}

/// In-memory process table.
///
/// `Terminate` and `Interrupt` kill a process unless it was marked with
/// [`FakeProcessProbe::ignore_terminate`]; `Kill` always does.
#[derive(Clone, Default)]
pub struct FakeProcessProbe {
    inner: Arc<Mutex<FakeProcesses>>,
}

impl FakeProcessProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, pid: ProcessId) {
        self.inner.lock().alive.insert(pid);
    }

    pub fn exit(&self, pid: ProcessId) {
        self.inner.lock().alive.remove(&pid);
    }

    pub fn ignore_terminate(&self, pid: ProcessId) {
        self.inner.lock().ignores_terminate.insert(pid);
    }

    pub fn signals(&self) -> Vec<(ProcessId, Signal)> {
        self.inner.lock().signals.clone()
    }
}

impl ProcessProbe for FakeProcessProbe {
    fn is_alive(&self, pid: ProcessId) -> bool {
        pid > 0 && self.inner.lock().alive.contains(&pid)
    }

    fn send(&self, pid: ProcessId, signal: Signal) -> bool {
        if pid <= 0 {
            return false;
        }
        let mut inner = self.inner.lock();
        inner.signals.push((pid, signal));
        if !inner.alive.contains(&pid) {
            return false;
        }
        let dies = match signal {
            Signal::Kill => true,
            Signal::Terminate | Signal::Interrupt => !inner.ignores_terminate.contains(&pid),
        };
        if dies {
            inner.alive.remove(&pid);
        }
        true
    }

    fn info(&self, pid: ProcessId) -> Option<ProcessInfo> {
        self.is_alive(pid).then(|| ProcessInfo {
            pid,
            cmdline: format!("fake-process {}", pid),
            status: "S".to_string(),
            start_time: None,
        })
    }
}
