// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use cape_core::WorkflowId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Minimum gap between two dispatches for the same workflow.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// Per-workflow rate limiter for change notifications.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last: HashMap<WorkflowId, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether an event for `id` observed at `now` should be dispatched.
    /// A `true` answer records `now` as the last dispatch.
    pub fn should_fire(&mut self, id: &WorkflowId, now: Instant) -> bool {
        if let Some(last) = self.last.get(id) {
            if now.saturating_duration_since(*last) < self.window {
                return false;
            }
        }
        self.last.insert(id.clone(), now);
        true
    }

    pub fn forget(&mut self, id: &WorkflowId) {
        self.last.remove(id);
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

#[cfg(test)]
#[path = "debounce_tests.rs"]
mod tests;
