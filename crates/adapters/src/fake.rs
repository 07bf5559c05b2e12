// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory spawner and change source for tests.

use crate::spawn::{ProcessSpawner, SpawnError};
use crate::watch::{ChangeEvent, ChangeKind, ChangeSource, ChangeStream, WatchError};
use cape_core::test_support::FakeProcessProbe;
use cape_core::ProcessId;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Recorded `spawn_detached` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnCall {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub pid: ProcessId,
}

/// Hands out fake pids and marks them alive in a [`FakeProcessProbe`].
#[derive(Clone)]
pub struct FakeSpawner {
    probe: FakeProcessProbe,
    next_pid: Arc<AtomicI32>,
    fail: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<SpawnCall>>>,
}

impl FakeSpawner {
    pub fn new(probe: FakeProcessProbe) -> Self {
        Self {
            probe,
            next_pid: Arc::new(AtomicI32::new(1000)),
            fail: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SpawnCall> {
        self.calls.lock().clone()
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn_detached(&self, program: &Path, args: &[String]) -> Result<ProcessId, SpawnError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SpawnError::Io {
                program: program.to_path_buf(),
                source: std::io::Error::other("injected spawn failure"),
            });
        }
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.probe.spawn(pid);
        self.calls.lock().push(SpawnCall {
            program: program.to_path_buf(),
            args: args.to_vec(),
            pid,
        });
        Ok(pid)
    }
}

/// Change source driven by [`ChannelChangeSource::emit`].
#[derive(Clone, Default)]
pub struct ChannelChangeSource {
    senders: Arc<Mutex<Vec<mpsc::Sender<ChangeEvent>>>>,
}

impl ChannelChangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a modification of `path` to every live subscriber.
    pub fn emit(&self, path: impl Into<PathBuf>) {
        self.emit_event(ChangeEvent {
            path: path.into(),
            kind: ChangeKind::Modified,
        });
    }

    pub fn emit_event(&self, event: ChangeEvent) {
        self.senders
            .lock()
            .retain(|tx| tx.try_send(event.clone()).is_ok() || !tx.is_closed());
    }

    pub fn subscribers(&self) -> usize {
        self.senders.lock().iter().filter(|tx| !tx.is_closed()).count()
    }
}

impl ChangeSource for ChannelChangeSource {
    fn subscribe(&self, _dir: &Path) -> Result<ChangeStream, WatchError> {
        let (tx, rx) = mpsc::channel(1024);
        self.senders.lock().push(tx);
        Ok(ChangeStream::from_receiver(rx))
    }
}
