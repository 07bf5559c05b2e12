//! Start, wait, status, and logs specs

use crate::prelude::*;

#[test]
fn start_runs_to_completion() {
    let home = Home::with_config(ECHO_STEPS);
    let id = home.start(42);
    assert!(!id.is_empty());

    home.cape()
        .args(&["workflow", "wait", &id, "--timeout", "20"])
        .passes()
        .stdout_has(&format!("Workflow {id} completed"));

    let state = home.state(&id).unwrap();
    assert_eq!(state["status"], "completed");
    assert_eq!(state["issue_id"], 42);
    assert_eq!(state["current_step"], "implementing");
    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || !home.pid_file(&id).exists()),
        "daemon should remove its pid file"
    );
}

#[test]
fn step_output_lands_in_log() {
    let home = Home::with_config(ECHO_STEPS);
    let id = home.start(42);
    home.cape()
        .args(&["workflow", "wait", &id, "--timeout", "20"])
        .passes();

    home.cape()
        .args(&["workflow", "logs", &id, "-n", "100"])
        .passes()
        .stdout_has("--- cape-workflow: starting")
        .stdout_has("planning for 42")
        .stdout_has("implementing implementing");
}

#[test]
fn default_steps_complete_without_config() {
    let home = Home::empty();
    let id = home.start(1);
    home.cape()
        .args(&["workflow", "wait", &id, "--timeout", "20"])
        .passes();

    let status = home
        .cape()
        .args(&["workflow", "status", &id, "-o", "json"])
        .passes()
        .json();
    assert_eq!(status["status"], "completed");
    assert_eq!(status["current_step"], "implementing");
    assert_eq!(status["running"], false);
}

#[test]
fn failing_step_fails_workflow() {
    let home = Home::with_config(FAILING_STEPS);
    let id = home.start(9);

    home.cape()
        .args(&["workflow", "wait", &id, "--timeout", "20"])
        .fails()
        .code(1)
        .stderr_has("step planning exited with code 3");

    assert_eq!(home.status_of(&id).as_deref(), Some("failed"));
}

#[test]
fn wait_times_out_on_slow_workflow() {
    let home = Home::with_config(SLOW_STEPS);
    let id = home.start(3);

    home.cape()
        .args(&["workflow", "wait", &id, "--timeout", "1"])
        .fails()
        .code(1)
        .stderr_has("timed out");
}

#[test]
fn watch_streams_until_done() {
    let home = Home::with_config(ECHO_STEPS);
    let id = home.start(5);

    home.cape()
        .args(&["workflow", "watch", &id, "--poll"])
        .passes()
        .stdout_has(&format!("Workflow {id} completed"));
}

#[test]
fn list_shows_running_workflow() {
    let home = Home::with_config(SLOW_STEPS);
    let id = home.start(77);
    assert!(wait_for(SPEC_WAIT_MAX_MS, || {
        home.status_of(&id).as_deref() == Some("running")
    }));

    home.cape()
        .args(&["workflow", "list"])
        .passes()
        .stdout_has("ISSUE")
        .stdout_has(&id)
        .stdout_has("77")
        .stdout_has("implementing");
}
