// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow state record and lifecycle state machine.

use crate::id::WorkflowId;
use crate::process::ProcessId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message recorded on workflows recovered without a backing process.
pub const ORPHANED_MESSAGE: &str = "Process terminated unexpectedly (orphaned state)";

/// Lifecycle status of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Daemon spawned, not yet executing steps
    Initializing,
    /// Daemon is executing steps
    Running,
    Completed,
    Failed,
    /// Stopped on request (signal or `stop`)
    Stopped,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    /// Whether a record in `self` may move to `to`.
    ///
    /// Re-asserting the current non-terminal status is allowed and treated
    /// as a no-op by [`WorkflowState::apply`].
    pub fn can_transition_to(self, to: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        match self {
            Initializing => matches!(to, Initializing | Running | Failed | Stopped),
            Running => matches!(to, Running | Completed | Failed | Stopped),
            Completed | Failed | Stopped => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("workflow is already {from}; no further status changes are allowed")]
    Terminal { from: WorkflowStatus },
    #[error("invalid transition from {from} to {to}")]
    Invalid {
        from: WorkflowStatus,
        to: WorkflowStatus,
    },
    #[error("error_message may only be set when transitioning to failed")]
    ErrorWithoutFailure,
}

/// Partial update to a [`WorkflowState`].
///
/// Only the mutable fields are representable; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePatch {
    pub status: Option<WorkflowStatus>,
    pub current_step: Option<String>,
    pub error_message: Option<String>,
}

impl StatePatch {
    pub fn status(status: WorkflowStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn step(name: impl Into<String>) -> Self {
        Self {
            current_step: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(WorkflowStatus::Failed),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_step(mut self, name: impl Into<String>) -> Self {
        self.current_step = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.current_step.is_none() && self.error_message.is_none()
    }
}

/// Structural problems found when validating a record read from disk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidState {
    #[error("invalid workflow id {0:?}")]
    BadId(String),
    #[error("workflow id {found:?} does not match file name {expected:?}")]
    IdMismatch { expected: String, found: String },
    #[error("pid must be positive, got {0}")]
    BadPid(ProcessId),
    #[error("updated_at {updated_at} precedes started_at {started_at}")]
    TimeTravel {
        started_at: NaiveDateTime,
        updated_at: NaiveDateTime,
    },
}

/// Persisted record describing one workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: WorkflowId,
    pub issue_id: i64,
    pub status: WorkflowStatus,
    pub pid: ProcessId,
    #[serde(with = "timestamp")]
    pub started_at: NaiveDateTime,
    #[serde(with = "timestamp")]
    pub updated_at: NaiveDateTime,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl WorkflowState {
    /// Initial record written right after the daemon is spawned.
    pub fn new(workflow_id: WorkflowId, issue_id: i64, pid: ProcessId, now: NaiveDateTime) -> Self {
        Self {
            workflow_id,
            issue_id,
            status: WorkflowStatus::Initializing,
            pid,
            started_at: now,
            updated_at: now,
            current_step: None,
            error_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a patch, enforcing the state machine.
    ///
    /// On error the record is left unchanged. `updated_at` never moves
    /// backwards even if `now` does.
    pub fn apply(&mut self, patch: &StatePatch, now: NaiveDateTime) -> Result<(), TransitionError> {
        if let Some(to) = patch.status {
            if self.status.is_terminal() {
                return Err(TransitionError::Terminal { from: self.status });
            }
            if !self.status.can_transition_to(to) {
                return Err(TransitionError::Invalid {
                    from: self.status,
                    to,
                });
            }
        }
        if patch.error_message.is_some() && patch.status != Some(WorkflowStatus::Failed) {
            return Err(TransitionError::ErrorWithoutFailure);
        }

        if let Some(to) = patch.status {
            self.status = to;
        }
        if let Some(step) = &patch.current_step {
            self.current_step = Some(step.clone());
        }
        if let Some(message) = &patch.error_message {
            self.error_message = Some(message.clone());
        }
        self.updated_at = self.updated_at.max(now);
        Ok(())
    }

    /// Check structural invariants for a record stored under `file_stem`.
    pub fn validate(&self, file_stem: &str) -> Result<(), InvalidState> {
        if !WorkflowId::is_valid(self.workflow_id.as_str()) {
            return Err(InvalidState::BadId(self.workflow_id.to_string()));
        }
        if self.workflow_id.as_str() != file_stem {
            return Err(InvalidState::IdMismatch {
                expected: file_stem.to_string(),
                found: self.workflow_id.to_string(),
            });
        }
        if self.pid <= 0 {
            return Err(InvalidState::BadPid(self.pid));
        }
        if self.started_at > self.updated_at {
            return Err(InvalidState::TimeTravel {
                started_at: self.started_at,
                updated_at: self.updated_at,
            });
        }
        Ok(())
    }

    /// Whole seconds since `started_at`, clamped at zero.
    pub fn elapsed_secs(&self, now: NaiveDateTime) -> u64 {
        (now - self.started_at).num_seconds().max(0) as u64
    }
}

/// Serde adapter for second-precision local timestamps (`2024-03-15T14:30:45`).
///
/// Fractional seconds are accepted on read and dropped.
pub mod timestamp {
    use chrono::{NaiveDateTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(at: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&at.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(d)?;
        parse(&text).map_err(serde::de::Error::custom)
    }

    pub fn parse(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        let at = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")?;
        Ok(at.with_nanosecond(0).unwrap_or(at))
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
