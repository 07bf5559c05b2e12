// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{sample_state, ts};
use WorkflowStatus::*;

#[yare::parameterized(
    init_to_running     = { Initializing, Running,   true },
    init_to_failed      = { Initializing, Failed,    true },
    init_to_stopped     = { Initializing, Stopped,   true },
    init_to_completed   = { Initializing, Completed, false },
    init_to_init        = { Initializing, Initializing, true },
    running_to_done     = { Running, Completed, true },
    running_to_failed   = { Running, Failed,    true },
    running_to_stopped  = { Running, Stopped,   true },
    running_to_init     = { Running, Initializing, false },
    running_to_running  = { Running, Running,   true },
    completed_to_failed = { Completed, Failed,  false },
    failed_to_running   = { Failed, Running,    false },
    stopped_to_stopped  = { Stopped, Stopped,   false },
)]
fn transition_table(from: WorkflowStatus, to: WorkflowStatus, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[yare::parameterized(
    initializing = { Initializing, false },
    running      = { Running, false },
    completed    = { Completed, true },
    failed       = { Failed, true },
    stopped      = { Stopped, true },
)]
fn terminal_statuses(status: WorkflowStatus, terminal: bool) {
    assert_eq!(status.is_terminal(), terminal);
}

#[test]
fn apply_moves_status_and_restamps() {
    let mut state = sample_state("abc12345", Initializing);
    let later = ts(10, 5, 0);
    state
        .apply(&StatePatch::status(Running).with_step("planning"), later)
        .unwrap();
    assert_eq!(state.status, Running);
    assert_eq!(state.current_step.as_deref(), Some("planning"));
    assert_eq!(state.updated_at, later);
}

#[test]
fn apply_never_moves_updated_at_backwards() {
    let mut state = sample_state("abc12345", Running);
    let before = state.updated_at;
    state
        .apply(&StatePatch::step("x"), before - chrono::Duration::hours(1))
        .unwrap();
    assert_eq!(state.updated_at, before);
}

#[test]
fn apply_rejects_status_on_terminal_record() {
    let mut state = sample_state("abc12345", Stopped);
    let snapshot = state.clone();
    let err = state
        .apply(&StatePatch::failed("late"), ts(11, 0, 0))
        .unwrap_err();
    assert_eq!(err, TransitionError::Terminal { from: Stopped });
    assert_eq!(state, snapshot);
}

#[test]
fn apply_rejects_invalid_transition() {
    let mut state = sample_state("abc12345", Initializing);
    let err = state
        .apply(&StatePatch::status(Completed), ts(11, 0, 0))
        .unwrap_err();
    assert_eq!(
        err,
        TransitionError::Invalid {
            from: Initializing,
            to: Completed
        }
    );
}

#[test]
fn error_message_requires_failure() {
    let mut state = sample_state("abc12345", Running);
    let patch = StatePatch {
        status: Some(Completed),
        error_message: Some("nope".into()),
        ..StatePatch::default()
    };
    assert_eq!(
        state.apply(&patch, ts(11, 0, 0)),
        Err(TransitionError::ErrorWithoutFailure)
    );
    assert_eq!(state.status, Running);
}

#[test]
fn failed_patch_sets_message() {
    let mut state = sample_state("abc12345", Running);
    state.apply(&StatePatch::failed("boom"), ts(11, 0, 0)).unwrap();
    assert_eq!(state.status, Failed);
    assert_eq!(state.error_message.as_deref(), Some("boom"));
}

#[test]
fn json_uses_second_precision_timestamps() {
    let state = sample_state("abc12345", Running);
    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["started_at"], "2024-03-15T10:00:00");
    assert_eq!(json["status"], "running");
    let back: WorkflowState = serde_json::from_value(json).unwrap();
    assert_eq!(back, state);
}

#[test]
fn fractional_seconds_are_accepted_and_dropped() {
    let at = timestamp::parse("2024-03-15T14:30:45.123456").unwrap();
    assert_eq!(at, ts(14, 30, 45));
}

#[test]
fn missing_optional_fields_deserialize_as_none() {
    let json = r#"{
        "workflow_id": "abc12345",
        "issue_id": 7,
        "status": "initializing",
        "pid": 42,
        "started_at": "2024-03-15T10:00:00",
        "updated_at": "2024-03-15T10:00:00"
    }"#;
    let state: WorkflowState = serde_json::from_str(json).unwrap();
    assert!(state.current_step.is_none());
    assert!(state.error_message.is_none());
}

#[test]
fn validate_checks_stem_pid_and_ordering() {
    let state = sample_state("abc12345", Running);
    assert!(state.validate("abc12345").is_ok());
    assert!(matches!(
        state.validate("other"),
        Err(InvalidState::IdMismatch { .. })
    ));

    let mut bad_pid = state.clone();
    bad_pid.pid = 0;
    assert_eq!(bad_pid.validate("abc12345"), Err(InvalidState::BadPid(0)));

    let mut backwards = state.clone();
    backwards.updated_at = backwards.started_at - chrono::Duration::seconds(1);
    assert!(matches!(
        backwards.validate("abc12345"),
        Err(InvalidState::TimeTravel { .. })
    ));

    let mut bad_id = state;
    bad_id.workflow_id = WorkflowId::new("../x");
    assert!(matches!(bad_id.validate("../x"), Err(InvalidState::BadId(_))));
}

#[test]
fn elapsed_is_clamped_at_zero() {
    let state = sample_state("abc12345", Running);
    assert_eq!(state.elapsed_secs(ts(10, 1, 30)), 90);
    assert_eq!(state.elapsed_secs(ts(9, 0, 0)), 0);
}
