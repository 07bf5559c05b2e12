// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Short-lived cache of state records.

use cape_core::{WorkflowId, WorkflowState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default time a cached record stays fresh.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

/// Per-monitor cache keyed by workflow id.
///
/// Entries expire `ttl` after insertion; an expired entry is treated as a
/// miss and evicted on lookup.
pub struct StatusCache {
    ttl: Duration,
    entries: Mutex<HashMap<WorkflowId, (Instant, WorkflowState)>>,
}

impl StatusCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, id: &WorkflowId) -> Option<WorkflowState> {
        let mut entries = self.entries.lock();
        match entries.get(id) {
            Some((at, state)) if at.elapsed() < self.ttl => Some(state.clone()),
            Some(_) => {
                entries.remove(id);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, state: WorkflowState) {
        self.entries
            .lock()
            .insert(state.workflow_id.clone(), (Instant::now(), state));
    }

    pub fn remove(&self, id: &WorkflowId) {
        self.entries.lock().remove(id);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
#[path = "status_cache_tests.rs"]
mod tests;
