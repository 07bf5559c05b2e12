//! CLI error handling specs

use crate::prelude::*;

#[test]
fn non_numeric_issue_is_usage_error() {
    Home::empty()
        .cape()
        .args(&["workflow", "start", "abc"])
        .fails()
        .code(2);
}

#[test]
fn status_of_unknown_workflow_exits_one() {
    Home::empty()
        .cape()
        .args(&["workflow", "status", "ghost"])
        .fails()
        .code(1)
        .stderr_has("workflow not found: ghost");
}

#[test]
fn path_like_id_is_rejected() {
    Home::empty()
        .cape()
        .args(&["workflow", "status", "../etc"])
        .fails()
        .code(2)
        .stderr_has("invalid workflow id");
}

#[test]
fn logs_of_unknown_workflow_fails() {
    Home::empty()
        .cape()
        .args(&["workflow", "logs", "ghost"])
        .fails()
        .code(1)
        .stderr_has("no log for workflow ghost");
}

#[test]
fn list_with_nothing_running() {
    Home::empty()
        .cape()
        .args(&["workflow", "list"])
        .passes()
        .stdout_eq("No active workflows\n");
}

#[test]
fn invalid_config_is_reported() {
    Home::with_config("retention_hours = \"soon\"\n")
        .cape()
        .args(&["workflow", "list"])
        .fails()
        .code(1)
        .stderr_has("invalid config");
}
