// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the core crate.

use std::path::PathBuf;

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.is_empty())
}

/// Base data directory override (`CAPE_DATA_DIR`)
pub fn data_dir() -> Option<PathBuf> {
    non_empty("CAPE_DATA_DIR").map(PathBuf::from)
}

/// PID directory override (`CAPE_RUNTIME_DIR`)
pub fn runtime_dir() -> Option<PathBuf> {
    non_empty("CAPE_RUNTIME_DIR").map(PathBuf::from)
}
