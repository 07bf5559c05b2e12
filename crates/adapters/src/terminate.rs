// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful-then-forced process shutdown.

use cape_core::{ProcessId, ProcessProbe, Signal};
use std::time::Duration;
use tokio::time::Instant;

/// Interval between liveness checks while waiting for exit.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for the kernel to tear down a SIGKILLed process.
pub const KILL_GRACE: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct TerminationController<P: ProcessProbe> {
    probe: P,
    poll_interval: Duration,
    kill_grace: Duration,
}

impl<P: ProcessProbe> TerminationController<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            poll_interval: POLL_INTERVAL,
            kill_grace: KILL_GRACE,
        }
    }

    /// Override polling cadence (for tests).
    pub fn with_intervals(mut self, poll_interval: Duration, kill_grace: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.kill_grace = kill_grace;
        self
    }

    /// Stop `pid`: SIGTERM, wait up to `timeout`, then SIGKILL.
    ///
    /// Returns whether the process is gone. A pid that is already dead
    /// returns `true` without any signal being sent.
    pub async fn terminate(&self, pid: ProcessId, timeout: Duration) -> bool {
        if !self.probe.is_alive(pid) {
            return true;
        }

        if !self.probe.send(pid, Signal::Terminate) {
            let gone = !self.probe.is_alive(pid);
            if !gone {
                tracing::warn!(pid, "failed to deliver SIGTERM");
            }
            return gone;
        }

        if self.wait_for_exit(pid, timeout).await {
            tracing::debug!(pid, "process exited after SIGTERM");
            return true;
        }

        tracing::warn!(
            pid,
            timeout_ms = timeout.as_millis() as u64,
            "process did not exit after SIGTERM, sending SIGKILL"
        );
        self.probe.send(pid, Signal::Kill);

        let dead = self.wait_for_exit(pid, self.kill_grace).await;
        if !dead {
            tracing::warn!(pid, "process still alive after SIGKILL");
        }
        dead
    }

    async fn wait_for_exit(&self, pid: ProcessId, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        loop {
            if !self.probe.is_alive(pid) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
#[path = "terminate_tests.rs"]
mod tests;
