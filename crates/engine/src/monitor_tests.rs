// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cape_core::test_support::{sample_state, ts, FakeProcessProbe};
use cape_core::{FakeClock, StatePatch};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    paths: CapePaths,
    probe: FakeProcessProbe,
    clock: FakeClock,
    monitor: WorkflowMonitor<FakeProcessProbe, FakeClock>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let paths = CapePaths::new(dir.path());
    paths.ensure().unwrap();
    let probe = FakeProcessProbe::new();
    let clock = FakeClock::new(ts(10, 0, 0));
    let monitor =
        WorkflowMonitor::with_parts(paths.clone(), probe.clone(), clock.clone(), Duration::from_secs(60));
    Fixture {
        _dir: dir,
        paths,
        probe,
        clock,
        monitor,
    }
}

impl Fixture {
    /// Record a workflow with a live (or dead) process.
    fn add(&self, id: &str, status: WorkflowStatus, pid: i32, alive: bool) -> WorkflowState {
        let mut state = sample_state(id, status);
        state.pid = pid;
        self.monitor.store().write(&state).unwrap();
        self.monitor.pids().write(&state.workflow_id, pid).unwrap();
        if alive {
            self.probe.spawn(pid);
        }
        state
    }
}

#[test]
fn status_serves_from_cache_until_bypassed() {
    let f = fixture();
    let state = f.add("wf1", WorkflowStatus::Running, 100, true);
    let id = state.workflow_id.clone();
    assert_eq!(f.monitor.status(&id, true), Some(state.clone()));

    f.monitor
        .store()
        .update(&id, &StatePatch::step("planning"))
        .unwrap();

    assert_eq!(f.monitor.status(&id, true), Some(state));
    let fresh = f.monitor.status(&id, false).unwrap();
    assert_eq!(fresh.current_step.as_deref(), Some("planning"));
    // Bypassing refreshed the cache
    assert_eq!(f.monitor.status(&id, true), Some(fresh));
}

#[test]
fn clear_cache_forces_reread() {
    let f = fixture();
    let state = f.add("wf1", WorkflowStatus::Running, 100, true);
    f.monitor.status(&state.workflow_id, true);
    f.monitor.store().delete(&state.workflow_id).unwrap();
    f.monitor.clear_cache();
    assert_eq!(f.monitor.status(&state.workflow_id, true), None);
}

#[test]
fn list_active_intersects_live_pids_with_records() {
    let f = fixture();
    f.add("live", WorkflowStatus::Running, 100, true);
    f.add("dead", WorkflowStatus::Running, 101, false);
    // Live pid without a record
    f.monitor.pids().write(&WorkflowId::new("bare"), 102).unwrap();
    f.probe.spawn(102);

    let active: Vec<_> = f
        .monitor
        .list_active()
        .into_iter()
        .map(|s| s.workflow_id)
        .collect();
    assert_eq!(active, vec![WorkflowId::new("live")]);
}

#[test]
fn list_active_excludes_stale_after_cleanup() {
    let f = fixture();
    f.add("live", WorkflowStatus::Running, 100, true);
    f.add("dead", WorkflowStatus::Running, 101, false);

    let removed = f.monitor.pids().cleanup_stale();

    assert_eq!(removed, vec![WorkflowId::new("dead")]);
    assert_eq!(f.monitor.list_active().len(), 1);
}

#[test]
fn is_running_checks_process() {
    let f = fixture();
    f.add("up", WorkflowStatus::Running, 100, true);
    f.add("down", WorkflowStatus::Running, 101, false);
    assert!(f.monitor.is_running(&WorkflowId::new("up")));
    assert!(!f.monitor.is_running(&WorkflowId::new("down")));
    assert!(!f.monitor.is_running(&WorkflowId::new("missing")));
}

#[test]
fn logs_tail_workflow_log() {
    let f = fixture();
    let id = WorkflowId::new("wf1");
    std::fs::write(f.paths.log_file(&id), "a\nb\nc\n").unwrap();
    assert_eq!(f.monitor.logs(&id, 2), Some(vec!["b".to_string(), "c".to_string()]));
    assert_eq!(f.monitor.logs(&WorkflowId::new("none"), 2), None);
    assert_eq!(f.monitor.logs(&WorkflowId::new("../x"), 2), None);
}

#[test]
fn progress_reports_elapsed_for_running_workflow() {
    let f = fixture();
    f.add("wf1", WorkflowStatus::Running, 100, true);
    f.clock.set(ts(11, 2, 3));

    let progress = f.monitor.progress(&WorkflowId::new("wf1")).unwrap();

    assert_eq!(progress.elapsed_seconds, 3723);
    assert_eq!(progress.elapsed, "1:02:03");
    assert_eq!(progress.status, WorkflowStatus::Running);
}

#[test]
fn progress_stops_clock_for_finished_workflow() {
    let f = fixture();
    let mut state = sample_state("wf1", WorkflowStatus::Completed);
    state.updated_at = ts(10, 0, 45);
    f.monitor.store().write(&state).unwrap();
    f.clock.set(ts(18, 0, 0));

    let progress = f.monitor.progress(&state.workflow_id).unwrap();
    assert_eq!(progress.elapsed, "0:00:45");
    assert!(f.monitor.progress(&WorkflowId::new("none")).is_none());
}

#[tokio::test(start_paused = true)]
async fn wait_returns_terminal_state() {
    let f = fixture();
    let state = f.add("wf1", WorkflowStatus::Running, 100, true);
    let id = state.workflow_id.clone();
    let store = f.monitor.store().clone();
    let finisher_id = id.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        store
            .update(&finisher_id, &StatePatch::status(WorkflowStatus::Completed))
            .unwrap();
    });

    let done = f
        .monitor
        .wait(&id, Some(Duration::from_secs(10)), Duration::from_millis(100))
        .await
        .unwrap();
    assert_eq!(done.status, WorkflowStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn wait_times_out_on_running_workflow() {
    let f = fixture();
    let state = f.add("wf1", WorkflowStatus::Running, 100, true);
    let err = f
        .monitor
        .wait(&state.workflow_id, Some(Duration::from_secs(2)), Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, WaitError::Timeout { .. }));
}

#[tokio::test(start_paused = true)]
async fn wait_reports_not_found() {
    let f = fixture();
    let err = f
        .monitor
        .wait(&WorkflowId::new("ghost"), Some(Duration::from_secs(1)), Duration::from_millis(100))
        .await
        .unwrap_err();
    assert_eq!(err, WaitError::NotFound(WorkflowId::new("ghost")));
}

#[test]
fn progress_serializes_with_snake_case_status() {
    let f = fixture();
    f.add("wf1", WorkflowStatus::Running, 100, true);
    f.clock.set(ts(10, 0, 5));
    let progress = f.monitor.progress(&WorkflowId::new("wf1")).unwrap();
    let json = serde_json::to_value(&progress).unwrap();
    assert_eq!(json["status"], "running");
    assert_eq!(json["elapsed"], "0:00:05");
    assert_eq!(json["workflow_id"], "wf1");
}
