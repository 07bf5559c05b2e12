//! Stop specs

use crate::prelude::*;

#[test]
fn stop_terminates_running_workflow() {
    let home = Home::with_config(SLOW_STEPS);
    let id = home.start(11);
    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || home.status_of(&id).as_deref() == Some("running")),
        "workflow never started running; log:\n{}",
        home.log(&id)
    );

    home.cape()
        .args(&["workflow", "stop", &id, "--timeout", "5"])
        .passes()
        .stdout_has(&format!("Stopped workflow {id}"));

    assert_eq!(home.status_of(&id).as_deref(), Some("stopped"));
    assert!(!home.pid_file(&id).exists());

    // A finished workflow is reported, not signalled
    home.cape()
        .args(&["workflow", "stop", &id])
        .passes()
        .stdout_has("already stopped");
}

#[test]
fn stop_unknown_workflow_exits_one() {
    Home::empty()
        .cape()
        .args(&["workflow", "stop", "ghost"])
        .fails()
        .code(1);
}
