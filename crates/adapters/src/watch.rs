// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory change sources.
//!
//! A [`ChangeSource`] turns a directory into a stream of per-file change
//! events. Two backends exist: native OS notifications through `notify`, and
//! a stat-diffing poller for filesystems where notifications are unreliable
//! (network mounts, some containers).

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 256;

/// Default interval for [`PollingChangeSource`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to watch {path}: {source}")]
    Notify {
        path: PathBuf,
        source: notify::Error,
    },
    #[error("failed to scan {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("polling watcher requires a tokio runtime")]
    NoRuntime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Created, written, or renamed into place
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Receiving end of a subscription. Dropping it ends the subscription.
pub struct ChangeStream {
    rx: mpsc::Receiver<ChangeEvent>,
    _watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
}

impl ChangeStream {
    /// Stream fed by an arbitrary sender (fakes, adapters).
    pub fn from_receiver(rx: mpsc::Receiver<ChangeEvent>) -> Self {
        Self {
            rx,
            _watcher: None,
            task: None,
        }
    }

    /// Next event, or `None` once the source has shut down.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub trait ChangeSource: Send + Sync + 'static {
    /// Watch the entries of `dir` (non-recursively).
    fn subscribe(&self, dir: &Path) -> Result<ChangeStream, WatchError>;
}

/// Native filesystem notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyChangeSource;

impl ChangeSource for NotifyChangeSource {
    fn subscribe(&self, dir: &Path) -> Result<ChangeStream, WatchError> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            let Ok(event) = res else {
                return;
            };
            let kind = match event.kind {
                EventKind::Remove(_) => ChangeKind::Removed,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any => {
                    ChangeKind::Modified
                }
                EventKind::Access(_) | EventKind::Other => return,
            };
            for path in event.paths {
                // Gone when the receiver is dropped; nothing left to notify
                let _ = tx.blocking_send(ChangeEvent { path, kind });
            }
        })
        .map_err(|source| WatchError::Notify {
            path: dir.to_path_buf(),
            source,
        })?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Notify {
                path: dir.to_path_buf(),
                source,
            })?;

        Ok(ChangeStream {
            rx,
            _watcher: Some(watcher),
            task: None,
        })
    }
}

/// Periodic stat-based diffing of a directory.
#[derive(Debug, Clone, Copy)]
pub struct PollingChangeSource {
    interval: Duration,
}

impl PollingChangeSource {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for PollingChangeSource {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

/// What a poll remembers about a file. The inode catches atomic
/// replacement even when size and mtime are unchanged.
type Fingerprint = (Option<SystemTime>, u64, u64);

fn scan(dir: &Path) -> std::io::Result<HashMap<PathBuf, Fingerprint>> {
    let mut files = HashMap::new();
    for entry in std::fs::read_dir(dir)?.flatten() {
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if meta.is_file() {
            files.insert(entry.path(), (meta.modified().ok(), meta.len(), meta.ino()));
        }
    }
    Ok(files)
}

/// Events that turn `before` into `after`, sorted by path.
pub(crate) fn diff(
    before: &HashMap<PathBuf, Fingerprint>,
    after: &HashMap<PathBuf, Fingerprint>,
) -> Vec<ChangeEvent> {
    let mut events: Vec<ChangeEvent> = after
        .iter()
        .filter(|(path, fp)| before.get(*path) != Some(*fp))
        .map(|(path, _)| ChangeEvent {
            path: path.clone(),
            kind: ChangeKind::Modified,
        })
        .chain(
            before
                .keys()
                .filter(|path| !after.contains_key(*path))
                .map(|path| ChangeEvent {
                    path: path.clone(),
                    kind: ChangeKind::Removed,
                }),
        )
        .collect();
    events.sort_by(|a, b| a.path.cmp(&b.path));
    events
}

impl ChangeSource for PollingChangeSource {
    fn subscribe(&self, dir: &Path) -> Result<ChangeStream, WatchError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| WatchError::NoRuntime)?;
        let initial = scan(dir).map_err(|source| WatchError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let dir = dir.to_path_buf();
        let interval = self.interval;

        let task = handle.spawn(async move {
            let mut known = initial;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let current = match scan(&dir) {
                    Ok(current) => current,
                    Err(e) => {
                        tracing::debug!(dir = %dir.display(), error = %e, "poll scan failed");
                        continue;
                    }
                };
                for event in diff(&known, &current) {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                known = current;
            }
        });

        Ok(ChangeStream {
            rx,
            _watcher: None,
            task: Some(task),
        })
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
