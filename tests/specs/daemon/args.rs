//! cape-workflow argument handling specs

use crate::prelude::*;

fn daemon(home: &Home) -> CliBuilder {
    CliBuilder::daemon().env("CAPE_DATA_DIR", home.path())
}

#[test]
fn missing_args_exit_two_with_usage() {
    let home = Home::empty();
    daemon(&home)
        .fails()
        .code(2)
        .stderr_has("Usage: cape-workflow <issue_id> <workflow_id>");
}

#[test]
fn bad_issue_id_exits_two() {
    let home = Home::empty();
    daemon(&home)
        .args(&["nope", "wf1"])
        .fails()
        .code(2)
        .stderr_has("invalid issue id 'nope'");
}

#[test]
fn help_and_version_pass() {
    let home = Home::empty();
    daemon(&home).args(&["--help"]).passes().stdout_has("Usage");
    daemon(&home)
        .args(&["--version"])
        .passes()
        .stdout_has("cape-workflow");
}

#[test]
fn daemon_without_record_gives_up() {
    let home = Home::with_config("handshake_timeout_ms = 100\n");
    daemon(&home).args(&["5", "orphan1"]).fails().code(1);
    let log = home.log("orphan1");
    assert!(log.contains("--- cape-workflow: starting"), "log:\n{log}");
}

#[test]
fn setup_error_fails_workflow_and_releases_pid_file() {
    let home = Home::with_config("retention_hours = [\n");
    home.write_state("brokencfg", "initializing", DEAD_PID, "2024-01-01T00:00:00");
    home.write_pid("brokencfg", DEAD_PID);

    daemon(&home)
        .args(&["7", "brokencfg"])
        .fails()
        .code(1)
        .stderr_has("invalid config");

    let state = home.state("brokencfg").unwrap();
    assert_eq!(state["status"], "failed");
    let message = state["error_message"].as_str().unwrap_or_default();
    assert!(message.contains("invalid config"), "error_message: {message}");
    assert!(!home.pid_file("brokencfg").exists());
    assert!(home.log("brokencfg").contains("failed to start workflow"));
}

#[test]
fn setup_error_keeps_final_status() {
    let home = Home::with_config("retention_hours = [\n");
    home.write_state("donecfg", "completed", DEAD_PID, "2024-01-01T00:00:00");

    daemon(&home).args(&["7", "donecfg"]).fails().code(1);

    assert_eq!(home.status_of("donecfg").as_deref(), Some("completed"));
}
