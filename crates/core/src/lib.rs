// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cape-core: shared types for the Cape workflow supervisor

pub mod clock;
pub mod config;
pub mod env;
pub mod id;
pub mod paths;
pub mod process;
pub mod time_fmt;
pub mod workflow;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{hours, Config, ConfigError, StepConfig};
pub use id::{IdGen, SequentialIdGen, ShortUuidIdGen, WorkflowId};
pub use paths::{CapePaths, PathsError};
pub use process::{ProcessId, ProcessInfo, ProcessProbe, Signal};
pub use time_fmt::format_hms;
pub use workflow::{
    InvalidState, StatePatch, TransitionError, WorkflowState, WorkflowStatus, ORPHANED_MESSAGE,
};
