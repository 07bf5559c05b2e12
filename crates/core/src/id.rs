// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow identifiers and ID generation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Longest identifier accepted as a file stem.
pub const MAX_WORKFLOW_ID_LEN: usize = 64;

/// Length of generated workflow ids.
pub const WORKFLOW_ID_LEN: usize = 8;

/// Unique identifier for a workflow run.
///
/// The id doubles as the file stem of the workflow's PID, state, and log
/// files, so only ids accepted by [`WorkflowId::is_valid`] ever reach disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse user- or filesystem-supplied text, rejecting anything that is
    /// not safe to use as a file stem.
    pub fn parse(id: &str) -> Option<Self> {
        if Self::is_valid(id) {
            Some(Self(id.to_string()))
        } else {
            None
        }
    }

    /// Non-empty, bounded, `[A-Za-z0-9_-]`, and never a dotfile.
    pub fn is_valid(id: &str) -> bool {
        !id.is_empty()
            && id.len() <= MAX_WORKFLOW_ID_LEN
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkflowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WorkflowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for WorkflowId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for WorkflowId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::borrow::Borrow<str> for WorkflowId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Generates unique workflow identifiers
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> WorkflowId;
}

/// Short UUID-based generator for production use (first 8 hex chars of a v4 UUID)
#[derive(Clone, Default)]
pub struct ShortUuidIdGen;

impl IdGen for ShortUuidIdGen {
    fn next(&self) -> WorkflowId {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(WORKFLOW_ID_LEN);
        WorkflowId(id)
    }
}

/// Sequential ID generator for testing
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("wf")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> WorkflowId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        WorkflowId::new(format!("{}-{}", self.prefix, n))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
