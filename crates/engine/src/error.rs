// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for launching and waiting on workflows

use cape_adapters::{SpawnError, WatchError};
use cape_core::WorkflowId;
use cape_storage::StorageError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to create {path}: {source}")]
    Layout {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error("failed to record workflow {workflow_id}: {source}")]
    Record {
        workflow_id: WorkflowId,
        source: StorageError,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaitError {
    #[error("workflow {0} not found")]
    NotFound(WorkflowId),
    #[error("timed out after {}s waiting for workflow {workflow_id}", .waited.as_secs())]
    Timeout {
        workflow_id: WorkflowId,
        waited: Duration,
    },
}

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error("state watcher requires a tokio runtime")]
    NoRuntime,
}
