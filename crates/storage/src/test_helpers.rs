// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::{FileOps, FsFileOps};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Real filesystem ops with injectable rename failure.
#[derive(Clone, Default)]
pub(crate) struct FlakyFileOps {
    fail_rename: Arc<AtomicBool>,
}

impl FlakyFileOps {
    pub(crate) fn set_fail_rename(&self, fail: bool) {
        self.fail_rename.store(fail, Ordering::SeqCst);
    }
}

impl FileOps for FlakyFileOps {
    fn write_tmp(&self, dir: &Path, data: &[u8]) -> std::io::Result<PathBuf> {
        FsFileOps.write_tmp(dir, data)
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        if self.fail_rename.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("injected rename failure"));
        }
        FsFileOps.rename(from, to)
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        FsFileOps.remove(path)
    }
}

/// Sorted file names in `dir`.
pub(crate) fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
