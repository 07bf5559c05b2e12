//! CLI help and version specs

use crate::prelude::*;

#[test]
fn no_args_prints_help() {
    Home::empty()
        .cape()
        .passes()
        .stdout_has("Usage: cape")
        .stdout_has("workflow");
}

#[test]
fn workflow_help_lists_subcommands() {
    let out = Home::empty()
        .cape()
        .args(&["workflow", "--help"])
        .passes()
        .stdout();
    for sub in ["start", "list", "status", "stop", "logs", "wait", "watch", "cleanup"] {
        assert!(out.contains(sub), "missing {sub} in:\n{out}");
    }
}

#[test]
fn version_flag_prints_version() {
    Home::empty()
        .cape()
        .args(&["-v"])
        .passes()
        .stdout_has(env!("CARGO_PKG_VERSION"));
}
