// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Crash-safe on-disk records for Cape workflows

mod atomic;
mod error;
mod pid_registry;
mod state_store;

#[cfg(test)]
mod test_helpers;

pub use atomic::{write_atomic, FileOps, FsFileOps, TMP_PREFIX};
pub use error::StorageError;
pub use pid_registry::{DiscoveredWorkflow, PidRegistry};
pub use state_store::StateStore;
