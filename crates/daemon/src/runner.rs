// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drives one workflow through its steps, recording progress in the state
//! store.

use async_trait::async_trait;
use cape_core::{
    Clock, StatePatch, StepConfig, SystemClock, TransitionError, WorkflowId, WorkflowState,
    WorkflowStatus,
};
use cape_storage::{StateStore, StorageError};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;

const HANDSHAKE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum StepError {
    #[error("step {step}: failed to open log {path}: {source}")]
    Log {
        step: String,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("step {step}: failed to run command: {source}")]
    Spawn {
        step: String,
        source: std::io::Error,
    },
    #[error("step {step} exited with {}", .code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    Exit { step: String, code: Option<i32> },
    #[error("step {step} timed out after {secs}s")]
    Timeout { step: String, secs: u64 },
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no state record for workflow {workflow_id} after {}ms", .waited.as_millis())]
    Handshake {
        workflow_id: WorkflowId,
        waited: Duration,
    },
    #[error("state record for workflow {0} disappeared")]
    Missing(WorkflowId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed(String),
    Stopped,
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Completed => 0,
            Outcome::Failed(_) => 1,
            Outcome::Stopped => 130,
        }
    }

    fn of_terminal(state: &WorkflowState) -> Self {
        match state.status {
            WorkflowStatus::Completed => Outcome::Completed,
            WorkflowStatus::Failed => {
                Outcome::Failed(state.error_message.clone().unwrap_or_default())
            }
            _ => Outcome::Stopped,
        }
    }
}

/// Identity passed to every step.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub workflow_id: WorkflowId,
    pub issue_id: i64,
}

#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn run(&self, ctx: &StepContext, step: &StepConfig) -> Result<(), StepError>;
}

/// Runs each step's command with `sh -c`, appending its output to the
/// workflow log.
#[derive(Debug, Clone)]
pub struct CommandStepExecutor {
    log_path: PathBuf,
}

impl CommandStepExecutor {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }
}

#[async_trait]
impl StepExecutor for CommandStepExecutor {
    async fn run(&self, ctx: &StepContext, step: &StepConfig) -> Result<(), StepError> {
        let Some(command) = &step.command else {
            tracing::debug!(step = %step.name, "no command; skipping");
            return Ok(());
        };
        let log_err = |source| StepError::Log {
            step: step.name.clone(),
            path: self.log_path.clone(),
            source,
        };
        let stdout = crate::logging::open_append(&self.log_path).map_err(log_err)?;
        let stderr = stdout.try_clone().map_err(log_err)?;

        let spawn_err = |source| StepError::Spawn {
            step: step.name.clone(),
            source,
        };
        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .env("CAPE_WORKFLOW_ID", ctx.workflow_id.as_str())
            .env("CAPE_ISSUE_ID", ctx.issue_id.to_string())
            .env("CAPE_STEP", &step.name)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        let status = match step.timeout() {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(step = %step.name, error = %e, "failed to kill timed out step");
                    }
                    return Err(StepError::Timeout {
                        step: step.name.clone(),
                        secs: limit.as_secs(),
                    });
                }
            },
            None => child.wait().await,
        }
        .map_err(spawn_err)?;

        if status.success() {
            Ok(())
        } else {
            Err(StepError::Exit {
                step: step.name.clone(),
                code: status.code(),
            })
        }
    }
}

pub struct WorkflowRunner<E: StepExecutor, C: Clock = SystemClock> {
    store: StateStore<C>,
    ctx: StepContext,
    steps: Vec<StepConfig>,
    executor: E,
    handshake_timeout: Duration,
}

impl<E: StepExecutor, C: Clock> WorkflowRunner<E, C> {
    pub fn new(
        store: StateStore<C>,
        workflow_id: WorkflowId,
        issue_id: i64,
        steps: Vec<StepConfig>,
        executor: E,
    ) -> Self {
        Self {
            store,
            ctx: StepContext {
                workflow_id,
                issue_id,
            },
            steps,
            executor,
            handshake_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.ctx.workflow_id
    }

    /// Wait for the launcher to write the initial record.
    pub async fn handshake(&self) -> Result<WorkflowState, RunError> {
        let started = tokio::time::Instant::now();
        loop {
            if let Some(state) = self.store.read(&self.ctx.workflow_id) {
                return Ok(state);
            }
            let waited = started.elapsed();
            if waited >= self.handshake_timeout {
                return Err(RunError::Handshake {
                    workflow_id: self.ctx.workflow_id.clone(),
                    waited,
                });
            }
            tokio::time::sleep(HANDSHAKE_POLL.min(self.handshake_timeout - waited)).await;
        }
    }

    pub async fn run(&self) -> Result<Outcome, RunError> {
        let id = &self.ctx.workflow_id;
        let state = self.handshake().await?;
        if state.is_terminal() {
            tracing::info!(workflow_id = %id, status = %state.status, "workflow already finished");
            return Ok(Outcome::of_terminal(&state));
        }

        if let Some(outcome) = self.apply(&StatePatch::status(WorkflowStatus::Running))? {
            return Ok(outcome);
        }

        for step in &self.steps {
            let patch = StatePatch::status(WorkflowStatus::Running).with_step(&step.name);
            if let Some(outcome) = self.apply(&patch)? {
                tracing::info!(workflow_id = %id, step = %step.name, "workflow ended before step");
                return Ok(outcome);
            }
            tracing::info!(workflow_id = %id, step = %step.name, "step started");

            if let Err(e) = self.executor.run(&self.ctx, step).await {
                let message = e.to_string();
                tracing::error!(workflow_id = %id, step = %step.name, error = %message, "step failed");
                return Ok(self
                    .apply(&StatePatch::failed(&message))?
                    .unwrap_or(Outcome::Failed(message)));
            }
            tracing::info!(workflow_id = %id, step = %step.name, "step finished");
        }

        Ok(self
            .apply(&StatePatch::status(WorkflowStatus::Completed))?
            .unwrap_or(Outcome::Completed))
    }

    /// Record a stop requested by signal. Keeps an existing final status.
    pub fn mark_stopped(&self) {
        settle(
            &self.store,
            &self.ctx.workflow_id,
            &StatePatch::status(WorkflowStatus::Stopped),
        );
    }

    /// Apply `patch`. `Some` means the record was already terminal and the
    /// run must end with that outcome.
    fn apply(&self, patch: &StatePatch) -> Result<Option<Outcome>, RunError> {
        let id = &self.ctx.workflow_id;
        match self.store.update(id, patch) {
            Ok(Some(_)) => Ok(None),
            Ok(None) => Err(RunError::Missing(id.clone())),
            Err(StorageError::Transition(TransitionError::Terminal { .. })) => self
                .store
                .read(id)
                .map(|state| Some(Outcome::of_terminal(&state)))
                .ok_or_else(|| RunError::Missing(id.clone())),
            Err(e) => Err(e.into()),
        }
    }
}

/// Record an error that ended the daemon before its workflow finished.
/// Keeps an existing final status.
pub fn mark_failed<C: Clock>(store: &StateStore<C>, id: &WorkflowId, message: &str) {
    settle(store, id, &StatePatch::failed(message));
}

fn settle<C: Clock>(store: &StateStore<C>, id: &WorkflowId, patch: &StatePatch) {
    let status = patch.status.map_or("updated", |s| s.as_str());
    match store.update(id, patch) {
        Ok(Some(_)) => tracing::info!(workflow_id = %id, status, "recorded final status"),
        Ok(None) => tracing::debug!(workflow_id = %id, status, "no state record to update"),
        Err(StorageError::Transition(e)) => {
            tracing::debug!(workflow_id = %id, error = %e, "keeping final status")
        }
        Err(e) => tracing::warn!(workflow_id = %id, status, error = %e, "failed to record final status"),
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
