// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One JSON record per workflow under the state directory.
//!
//! Reads are lock-free and only ever observe complete files. Read-modify-write
//! updates serialize on an advisory lock at `<dir>/.locks/<id>.lock` so the
//! daemon's progress writes and a supervisor's `stop` cannot interleave.
//!
//! A record that fails to parse or validate is reported as absent; the
//! distinction from a missing file is visible only in the `warn` log.

use crate::atomic::{write_atomic, FileOps, FsFileOps};
use crate::StorageError;
use cape_core::paths::ensure_dir;
use cape_core::{Clock, StatePatch, SystemClock, WorkflowId, WorkflowState};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

const LOCKS_DIR: &str = ".locks";

#[derive(Clone)]
pub struct StateStore<C: Clock = SystemClock, W: FileOps = FsFileOps> {
    dir: PathBuf,
    clock: C,
    ops: W,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_parts(dir, SystemClock, FsFileOps)
    }
}

impl<C: Clock, W: FileOps> StateStore<C, W> {
    pub fn with_parts(dir: impl Into<PathBuf>, clock: C, ops: W) -> Self {
        Self {
            dir: dir.into(),
            clock,
            ops,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn path(&self, id: &WorkflowId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Create or replace the record for `state.workflow_id`.
    pub fn write(&self, state: &WorkflowState) -> Result<(), StorageError> {
        let id = &state.workflow_id;
        if !WorkflowId::is_valid(id.as_str()) {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        ensure_dir(&self.dir).map_err(StorageError::io(&self.dir))?;
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.ops, &self.path(id), &json)
    }

    /// Read and validate a record. Missing, unreadable, and invalid records
    /// are all `None`.
    pub fn read(&self, id: &WorkflowId) -> Option<WorkflowState> {
        if !WorkflowId::is_valid(id.as_str()) {
            return None;
        }
        let path = self.path(id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read state file");
                return None;
            }
        };
        let state: WorkflowState = match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping corrupt state file");
                return None;
            }
        };
        if let Err(e) = state.validate(id.as_str()) {
            tracing::warn!(path = %path.display(), error = %e, "skipping invalid state file");
            return None;
        }
        Some(state)
    }

    /// Apply `patch` under the record's lock.
    ///
    /// Returns `Ok(None)` when no readable record exists, and
    /// [`StorageError::Transition`] when the state machine rejects the patch.
    pub fn update(
        &self,
        id: &WorkflowId,
        patch: &StatePatch,
    ) -> Result<Option<WorkflowState>, StorageError> {
        if !WorkflowId::is_valid(id.as_str()) {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        let lock_dir = self.dir.join(LOCKS_DIR);
        ensure_dir(&lock_dir).map_err(StorageError::io(&lock_dir))?;
        let lock_path = self.lock_path(id);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(StorageError::io(&lock_path))?;
        lock.lock_exclusive().map_err(StorageError::io(&lock_path))?;

        let result = self.update_locked(id, patch);

        if let Err(e) = FileExt::unlock(&lock) {
            tracing::debug!(path = %lock_path.display(), error = %e, "unlock failed");
        }
        result
    }

    fn update_locked(
        &self,
        id: &WorkflowId,
        patch: &StatePatch,
    ) -> Result<Option<WorkflowState>, StorageError> {
        let Some(mut state) = self.read(id) else {
            return Ok(None);
        };
        state.apply(patch, self.clock.now())?;
        self.write(&state)?;
        Ok(Some(state))
    }

    fn lock_path(&self, id: &WorkflowId) -> PathBuf {
        self.dir.join(LOCKS_DIR).join(format!("{}.lock", id))
    }

    /// Remove the record. Returns whether a file was deleted.
    ///
    /// The update lock file stays; an updater may still hold it.
    pub fn delete(&self, id: &WorkflowId) -> Result<bool, StorageError> {
        if !WorkflowId::is_valid(id.as_str()) {
            return Ok(false);
        }
        remove_if_exists(&self.path(id))
    }

    /// Remove the update lock file of a record that is gone for good.
    pub fn remove_lock(&self, id: &WorkflowId) -> Result<bool, StorageError> {
        if !WorkflowId::is_valid(id.as_str()) {
            return Ok(false);
        }
        remove_if_exists(&self.lock_path(id))
    }

    /// Ids of every `<id>.json` in the directory, sorted.
    pub fn ids(&self) -> Vec<WorkflowId> {
        scan_ids(&self.dir, "json")
    }

    /// Every readable, valid record.
    pub fn list(&self) -> Vec<WorkflowState> {
        self.ids().iter().filter_map(|id| self.read(id)).collect()
    }
}

pub(crate) fn remove_if_exists(path: &Path) -> Result<bool, StorageError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Workflow ids of `<id>.<extension>` files in `dir`.
///
/// Dotfiles (temp files, the lock directory) and stems that are not valid
/// ids are skipped. A missing directory yields nothing.
pub(crate) fn scan_ids(dir: &Path, extension: &str) -> Vec<WorkflowId> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut ids: Vec<WorkflowId> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            if name.starts_with('.') {
                return None;
            }
            let stem = name.strip_suffix(extension)?.strip_suffix('.')?;
            WorkflowId::parse(stem)
        })
        .collect();
    ids.sort();
    ids
}

#[cfg(test)]
#[path = "state_store_tests.rs"]
mod tests;
