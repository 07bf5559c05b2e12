// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workflow notifications for changes in the state directory.

use crate::debounce::Debouncer;
use crate::error::WatcherError;
use cape_adapters::{ChangeEvent, ChangeKind, ChangeSource, NotifyChangeSource};
use cape_core::WorkflowId;
use cape_storage::TMP_PREFIX;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Invoked with the id of the workflow whose state file changed.
pub type Callback = Arc<dyn Fn(&WorkflowId) + Send + Sync>;

#[derive(Default)]
struct Dispatch {
    callbacks: Mutex<HashMap<WorkflowId, Callback>>,
    debouncer: Mutex<Debouncer>,
}

impl Dispatch {
    fn handle(&self, event: &ChangeEvent) {
        if event.kind == ChangeKind::Removed {
            return;
        }
        let Some(id) = state_file_id(&event.path) else {
            return;
        };
        if event.path.is_dir() {
            return;
        }
        // Clone out so a callback may (un)register without deadlocking
        let Some(callback) = self.callbacks.lock().get(&id).cloned() else {
            return;
        };
        if !self.debouncer.lock().should_fire(&id, Instant::now()) {
            return;
        }
        if catch_unwind(AssertUnwindSafe(|| callback(&id))).is_err() {
            tracing::warn!(workflow_id = %id, "state change callback panicked");
        }
    }
}

/// Workflow id of a state record path, `None` for anything else.
fn state_file_id(path: &Path) -> Option<WorkflowId> {
    let name = path.file_name()?.to_str()?;
    if name.starts_with(TMP_PREFIX) {
        return None;
    }
    WorkflowId::parse(name.strip_suffix(".json")?)
}

pub struct StateWatcher<S: ChangeSource = NotifyChangeSource> {
    dir: PathBuf,
    source: S,
    dispatch: Arc<Dispatch>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StateWatcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_source(dir, NotifyChangeSource)
    }
}

impl<S: ChangeSource> StateWatcher<S> {
    pub fn with_source(dir: impl Into<PathBuf>, source: S) -> Self {
        Self {
            dir: dir.into(),
            source,
            dispatch: Arc::new(Dispatch::default()),
            task: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Replace any callback already registered for `id`.
    pub fn register<F>(&self, id: WorkflowId, callback: F)
    where
        F: Fn(&WorkflowId) + Send + Sync + 'static,
    {
        self.dispatch.callbacks.lock().insert(id, Arc::new(callback));
    }

    pub fn unregister(&self, id: &WorkflowId) {
        self.dispatch.callbacks.lock().remove(id);
        self.dispatch.debouncer.lock().forget(id);
    }

    /// Begin dispatching. A no-op while already running.
    pub fn start(&self) -> Result<(), WatcherError> {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Ok(());
        }
        let handle =
            tokio::runtime::Handle::try_current().map_err(|_| WatcherError::NoRuntime)?;
        let mut stream = self.source.subscribe(&self.dir)?;
        let dispatch = Arc::clone(&self.dispatch);
        *task = Some(handle.spawn(async move {
            while let Some(event) = stream.recv().await {
                dispatch.handle(&event);
            }
            tracing::debug!("state change stream closed");
        }));
        tracing::debug!(dir = %self.dir.display(), "state watcher started");
        Ok(())
    }

    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::debug!(dir = %self.dir.display(), "state watcher stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl<S: ChangeSource> Drop for StateWatcher<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "state_watcher_tests.rs"]
mod tests;
