// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OS process identity and liveness probing.

use serde::{Deserialize, Serialize};

/// Operating-system process id.
pub type ProcessId = i32;

/// Signals the supervisor sends to workflow processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Graceful shutdown request (SIGTERM)
    Terminate,
    /// Forced kill (SIGKILL)
    Kill,
    /// Interrupt (SIGINT)
    Interrupt,
}

/// Lightweight metadata about a running process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub cmdline: String,
    /// Single-letter scheduler state (`R`, `S`, `Z`, ...)
    pub status: String,
    pub start_time: Option<String>,
}

/// Answers "is this pid alive" and delivers signals.
///
/// Implementations must never probe or signal `pid <= 0`: those values
/// address process groups rather than a single process.
pub trait ProcessProbe: Clone + Send + Sync + 'static {
    fn is_alive(&self, pid: ProcessId) -> bool;

    /// Deliver `signal`; returns whether delivery succeeded.
    fn send(&self, pid: ProcessId, signal: Signal) -> bool;

    fn info(&self, pid: ProcessId) -> Option<ProcessInfo>;
}
