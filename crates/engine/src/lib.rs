// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Cape workflow supervision: launching, monitoring, and watching workflows

mod cleanup;
mod debounce;
mod error;
mod launcher;
mod log_tail;
mod monitor;
mod state_watcher;
mod status_cache;

pub use cleanup::{run_cleanup, CleanupReport};
pub use debounce::{Debouncer, DEBOUNCE_WINDOW};
pub use error::{LaunchError, WaitError, WatcherError};
pub use launcher::WorkflowLauncher;
pub use log_tail::tail_lines;
pub use monitor::{WorkflowMonitor, WorkflowProgress, DEFAULT_WAIT_POLL};
pub use state_watcher::{Callback, StateWatcher};
pub use status_cache::{StatusCache, DEFAULT_TTL};
