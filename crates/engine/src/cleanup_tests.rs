// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cape_core::test_support::{sample_state, ts, FakeProcessProbe};
use cape_core::{FakeClock, WorkflowStatus, ORPHANED_MESSAGE};
use cape_storage::FsFileOps;

const DAY: Duration = Duration::from_secs(24 * 3600);

#[test]
fn cleanup_purges_recovers_and_sweeps() {
    let dir = tempfile::tempdir().unwrap();
    let probe = FakeProcessProbe::new();
    let clock = FakeClock::new(ts(10, 0, 0));
    let pids = PidRegistry::new(dir.path().join("pids"), probe.clone());
    let store = StateStore::with_parts(dir.path().join("state"), clock.clone(), FsFileOps);

    // Alive and running
    let live = sample_state("live", WorkflowStatus::Running);
    store.write(&live).unwrap();
    pids.write(&live.workflow_id, 100).unwrap();
    probe.spawn(100);

    // Daemon crashed: dead pid, running record
    let crashed = sample_state("crashed", WorkflowStatus::Running);
    store.write(&crashed).unwrap();
    pids.write(&crashed.workflow_id, 101).unwrap();

    // Finished long ago
    let old = sample_state("old", WorkflowStatus::Completed);
    store.write(&old).unwrap();

    clock.set(ts(10, 0, 0) + chrono::Duration::days(2));
    let report = run_cleanup(&pids, &store, DAY);

    assert_eq!(report.stale, vec![WorkflowId::new("crashed")]);
    assert_eq!(report.orphaned, vec![WorkflowId::new("crashed")]);
    assert_eq!(report.expired, vec![WorkflowId::new("old")]);

    let recovered = store.read(&crashed.workflow_id).unwrap();
    assert_eq!(recovered.status, WorkflowStatus::Failed);
    assert_eq!(recovered.error_message.as_deref(), Some(ORPHANED_MESSAGE));
    assert!(store.read(&old.workflow_id).is_none());
    assert_eq!(
        store.read(&live.workflow_id).unwrap().status,
        WorkflowStatus::Running
    );
}

#[test]
fn cleanup_on_empty_dirs_reports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pids = PidRegistry::new(dir.path().join("pids"), FakeProcessProbe::new());
    let store = StateStore::new(dir.path().join("state"));
    assert!(run_cleanup(&pids, &store, DAY).is_empty());
}
