// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Temp-then-rename writes.
//!
//! Readers of a record path see either the previous complete content or the
//! new complete content, never a partial write. Temp files live in the
//! destination directory (so the rename stays on one filesystem) and carry
//! the [`TMP_PREFIX`] so directory scans skip them.

use crate::StorageError;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TMP_PREFIX: &str = ".tmp_";

/// File operations behind an atomic write, injectable for failure tests.
pub trait FileOps: Clone + Send + Sync + 'static {
    /// Write and fsync `data` to a new temp file inside `dir`, returning its path.
    fn write_tmp(&self, dir: &Path, data: &[u8]) -> std::io::Result<PathBuf>;

    /// Atomically replace `to` with `from`.
    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    fn remove(&self, path: &Path) -> std::io::Result<()>;
}

/// Real filesystem operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileOps;

impl FileOps for FsFileOps {
    fn write_tmp(&self, dir: &Path, data: &[u8]) -> std::io::Result<PathBuf> {
        let mut tmp = tempfile::Builder::new()
            .prefix(TMP_PREFIX)
            .tempfile_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        let (_file, path) = tmp.keep().map_err(|e| e.error)?;
        Ok(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// Replace `path` with `data` atomically.
///
/// On failure the temp file is removed and `path` is left untouched.
pub fn write_atomic<W: FileOps>(ops: &W, path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = ops.write_tmp(dir, data).map_err(StorageError::io(dir))?;
    if let Err(e) = ops.rename(&tmp, path) {
        if let Err(cleanup) = ops.remove(&tmp) {
            tracing::warn!(
                path = %tmp.display(),
                error = %cleanup,
                "failed to remove temp file"
            );
        }
        return Err(StorageError::Io {
            path: path.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
