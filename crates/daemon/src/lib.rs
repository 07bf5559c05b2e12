// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cape workflow daemon library
//!
//! Everything `cape-workflow` does besides signal handling and exit codes.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod args;
pub mod logging;
pub mod runner;

pub use args::{ArgsError, DaemonArgs, Invocation, USAGE};
pub use logging::{setup_logging, write_startup_error, write_startup_marker, STARTUP_MARKER_PREFIX};
pub use runner::{
    mark_failed, CommandStepExecutor, Outcome, RunError, StepContext, StepError, StepExecutor, WorkflowRunner,
};
