// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! OS-facing adapters: process probing, signalling, spawning, and
//! directory watching

pub mod process;
pub mod spawn;
pub mod terminate;
pub mod watch;

pub use process::UnixProcessProbe;
pub use spawn::{DetachedSpawner, ProcessSpawner, SpawnError};
pub use terminate::TerminationController;
pub use watch::{
    ChangeEvent, ChangeKind, ChangeSource, ChangeStream, NotifyChangeSource, PollingChangeSource,
    WatchError,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ChannelChangeSource, FakeSpawner, SpawnCall};
