// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cape workflow daemon (cape-workflow)
//!
//! Detached process running one workflow. Started by `cape workflow start`;
//! reports progress only through its state record and log file.

use anyhow::Context;
use cape_adapters::UnixProcessProbe;
use cape_core::{CapePaths, Config, ProcessProbe, WorkflowId};
use cape_daemon::{
    args, mark_failed, setup_logging, write_startup_error, write_startup_marker,
    CommandStepExecutor, DaemonArgs, Invocation, Outcome, WorkflowRunner, USAGE,
};
use cape_storage::{PidRegistry, StateStore};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

const EXIT_USAGE: i32 = 2;

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

async fn run() -> anyhow::Result<i32> {
    let args = match args::parse(std::env::args().skip(1)) {
        Ok(Invocation::Run(args)) => args,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(0);
        }
        Ok(Invocation::Version) => {
            println!("cape-workflow {}", env!("CARGO_PKG_VERSION"));
            return Ok(0);
        }
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("{USAGE}");
            return Ok(EXIT_USAGE);
        }
    };
    execute(args).await
}

async fn execute(args: DaemonArgs) -> anyhow::Result<i32> {
    let paths = args.paths()?;
    let id = args.workflow_id.clone();
    let pids = PidRegistry::new(&paths.runtime, UnixProcessProbe);
    let mut log_guard = None;

    let result = supervise(&args, &paths, &mut log_guard).await;
    if let Err(e) = &result {
        let message = format!("{e:#}");
        error!(workflow_id = %id, error = %message, "workflow aborted");
        mark_failed(&StateStore::new(&paths.state), &id, &message);
    }

    release_pid_file(&pids, &id);
    info!(workflow_id = %id, "daemon exiting");
    drop(log_guard);
    result
}

/// Run the workflow to an exit code. An `Err` is a fatal error that the
/// caller records on the workflow.
async fn supervise(
    args: &DaemonArgs,
    paths: &CapePaths,
    log_guard: &mut Option<WorkerGuard>,
) -> anyhow::Result<i32> {
    let id = &args.workflow_id;
    paths
        .ensure()
        .with_context(|| format!("failed to create {}", paths.base.display()))?;
    let log_path = paths.log_file(id);

    // Before tracing so the CLI can find where this attempt begins
    write_startup_marker(&log_path)
        .with_context(|| format!("failed to write {}", log_path.display()))?;

    let config = match Config::load(&paths.config_file()) {
        Ok(config) => config,
        Err(e) => {
            write_startup_error(&log_path, &e);
            return Err(e.into());
        }
    };

    let guard = setup_logging(&log_path)
        .with_context(|| format!("failed to set up logging to {}", log_path.display()))?;
    *log_guard = Some(guard);
    info!(workflow_id = %id, issue_id = args.issue_id, pid = std::process::id(), "starting workflow");

    let runner = WorkflowRunner::new(
        StateStore::new(&paths.state),
        id.clone(),
        args.issue_id,
        config.effective_steps(),
        CommandStepExecutor::new(&log_path),
    )
    .with_handshake_timeout(config.handshake_timeout());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let outcome = tokio::select! {
        result = runner.run() => result?,
        _ = sigterm.recv() => {
            info!(workflow_id = %id, "received SIGTERM, stopping");
            runner.mark_stopped();
            Outcome::Stopped
        }
        _ = sigint.recv() => {
            info!(workflow_id = %id, "received SIGINT, stopping");
            runner.mark_stopped();
            Outcome::Stopped
        }
    };

    match &outcome {
        Outcome::Completed => info!(workflow_id = %id, "workflow completed"),
        Outcome::Failed(message) => error!(workflow_id = %id, error = %message, "workflow failed"),
        Outcome::Stopped => info!(workflow_id = %id, "workflow stopped"),
    }
    Ok(outcome.exit_code())
}

/// Delete the PID file unless it names another live process.
fn release_pid_file(pids: &PidRegistry<UnixProcessProbe>, id: &WorkflowId) {
    let own = i32::try_from(std::process::id()).ok();
    match pids.read(id) {
        Some(pid) if Some(pid) != own && pids.probe().is_alive(pid) => {
            tracing::warn!(workflow_id = %id, pid, "pid file names another process; leaving it");
        }
        Some(_) => {
            if let Err(e) = pids.delete(id) {
                tracing::warn!(workflow_id = %id, error = %e, "failed to remove pid file");
            }
        }
        None => {}
    }
}

fn print_help() {
    println!("cape-workflow {}", env!("CARGO_PKG_VERSION"));
    println!("Cape workflow daemon - runs one workflow in the background");
    println!();
    println!("USAGE:");
    println!("    cape-workflow <issue_id> <workflow_id> [OPTIONS]");
    println!();
    println!("The daemon is started by `cape workflow start` and should not");
    println!("be invoked directly. Progress is written to the workflow's state");
    println!("record and log file.");
    println!();
    println!("OPTIONS:");
    println!("        --data-dir <PATH>       Base data directory [env: CAPE_DATA_DIR]");
    println!("        --runtime-dir <PATH>    PID file directory [env: CAPE_RUNTIME_DIR]");
    println!("    -h, --help                  Print help information");
    println!("    -v, --version               Print version information");
}
