//! Cleanup specs

use crate::prelude::*;

#[test]
fn cleanup_on_empty_home() {
    Home::empty()
        .cape()
        .args(&["workflow", "cleanup"])
        .passes()
        .stdout_eq("Nothing to clean up\n");
}

#[test]
fn cleanup_recovers_orphan_and_expires_old_records() {
    let home = Home::empty();
    // Daemon died without cleaning up
    home.write_state("crashed", "running", DEAD_PID, "2024-01-01T00:05:00");
    home.write_pid("crashed", DEAD_PID);
    // Finished long ago
    home.write_state("ancient", "completed", DEAD_PID, "2024-01-01T00:10:00");

    let report = home
        .cape()
        .args(&["workflow", "cleanup", "-o", "json"])
        .passes()
        .json();

    assert_eq!(report["stale"], serde_json::json!(["crashed"]));
    assert_eq!(report["orphaned"], serde_json::json!(["crashed"]));
    assert_eq!(report["expired"], serde_json::json!(["ancient"]));

    assert!(!home.pid_file("crashed").exists());
    assert!(!home.state_file("ancient").exists());
    let crashed = home.state("crashed").unwrap();
    assert_eq!(crashed["status"], "failed");
    assert_eq!(
        crashed["error_message"],
        "Process terminated unexpectedly (orphaned state)"
    );
}

#[test]
fn cleanup_keeps_recent_records() {
    let home = Home::empty();
    let id = home.start(2);
    home.cape()
        .args(&["workflow", "wait", &id, "--timeout", "20"])
        .passes();

    home.cape()
        .args(&["workflow", "cleanup", "--max-age-hours", "1"])
        .passes();
    assert!(home.state_file(&id).exists());
}

#[test]
fn cleanup_with_enormous_max_age_keeps_old_records() {
    let home = Home::empty();
    home.write_state("veryold", "completed", DEAD_PID, "2024-01-01T00:10:00");

    home.cape()
        .args(&["workflow", "cleanup", "--max-age-hours", "18446744073709551615"])
        .passes()
        .stdout_has("Nothing to clean up");
    assert!(home.state_file("veryold").exists());
}
