// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Locating the `cape-workflow` daemon binary.

use std::path::{Path, PathBuf};

pub const DAEMON_BINARY: &str = "cape-workflow";

/// `CAPE_DAEMON_BINARY`, then the dev build next to the manifest, then a
/// sibling of this executable, then `PATH`.
pub fn find_daemon_binary() -> PathBuf {
    if let Some(path) = crate::env::daemon_binary() {
        return PathBuf::from(path);
    }

    let current_exe = std::env::current_exe().ok();

    // Only trust CARGO_MANIFEST_DIR from a debug build; a release binary
    // run from a dev shell must not pick up a stale debug daemon.
    let is_debug_build = current_exe
        .as_ref()
        .and_then(|p| p.to_str())
        .is_some_and(|s| s.contains("target/debug"));

    if is_debug_build {
        let dev_path = crate::env::cargo_manifest_dir().and_then(|dir| {
            Path::new(&dir)
                .parent()
                .and_then(Path::parent)
                .map(|root| root.join("target/debug").join(DAEMON_BINARY))
        });
        if let Some(path) = dev_path.filter(|p| p.exists()) {
            return path;
        }
    }

    current_exe
        .as_deref()
        .and_then(sibling_binary)
        .unwrap_or_else(|| PathBuf::from(DAEMON_BINARY))
}

fn sibling_binary(exe: &Path) -> Option<PathBuf> {
    let sibling = exe.parent()?.join(DAEMON_BINARY);
    sibling.exists().then_some(sibling)
}

#[cfg(test)]
#[path = "daemon_process_tests.rs"]
mod tests;
