// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cape workflow` command handlers

use std::time::Duration;

use anyhow::Result;
use cape_adapters::{
    ChangeSource, DetachedSpawner, NotifyChangeSource, PollingChangeSource, UnixProcessProbe,
};
use cape_core::{format_hms, CapePaths, Clock, Config, SystemClock, WorkflowId, WorkflowState};
use cape_engine::{
    run_cleanup, CleanupReport, StateWatcher, WaitError, WorkflowLauncher, WorkflowMonitor,
};
use cape_storage::PidRegistry;
use chrono::NaiveDateTime;
use clap::{Args, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::daemon_process::find_daemon_binary;
use crate::exit_error::ExitError;
use crate::output::{or_dash, print_json, print_json_line, OutputFormat};
use crate::poll::{poll_interval, Poller, Tick};
use crate::table::{Column, Table};

#[derive(Args)]
pub struct WorkflowArgs {
    #[command(subcommand)]
    pub command: WorkflowCommand,
}

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Start a workflow for an issue and print its id
    Start {
        /// Issue to process
        issue_id: i64,
    },
    /// List active workflows
    List,
    /// Show one workflow's status
    Status {
        /// Workflow ID
        id: String,
    },
    /// Stop a workflow (SIGTERM, then SIGKILL after the timeout)
    Stop {
        /// Workflow ID
        id: String,
        /// Seconds to wait after SIGTERM [default: stop_timeout_secs from config]
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the tail of a workflow's log
    Logs {
        /// Workflow ID
        id: String,
        /// Number of lines
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
    /// Block until a workflow finishes
    Wait {
        /// Workflow ID
        id: String,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Print each state change until the workflow finishes
    Watch {
        /// Workflow ID
        id: String,
        /// Poll the state directory instead of using OS notifications
        #[arg(long)]
        poll: bool,
    },
    /// Remove stale PID files, recover orphans, and delete old finished workflows
    Cleanup {
        /// Delete finished workflows older than this [default: retention_hours from config]
        #[arg(long)]
        max_age_hours: Option<u64>,
    },
}

/// Resolved layout and configuration shared by every subcommand.
pub struct Context {
    pub paths: CapePaths,
    pub config: Config,
}

impl Context {
    pub fn load() -> Result<Self> {
        let paths = CapePaths::from_env()?;
        let config = Config::load(&paths.config_file())?;
        Ok(Self { paths, config })
    }

    fn monitor(&self) -> WorkflowMonitor<UnixProcessProbe> {
        WorkflowMonitor::with_parts(
            self.paths.clone(),
            UnixProcessProbe,
            SystemClock,
            self.config.status_cache_ttl(),
        )
    }

    fn launcher(&self) -> WorkflowLauncher<DetachedSpawner, UnixProcessProbe> {
        let daemon = find_daemon_binary();
        tracing::debug!(daemon = %daemon.display(), "resolved daemon binary");
        WorkflowLauncher::new(
            self.paths.clone(),
            daemon,
            DetachedSpawner,
            UnixProcessProbe,
        )
    }
}

fn parse_id(id: &str) -> Result<WorkflowId> {
    WorkflowId::parse(id)
        .ok_or_else(|| ExitError::new(2, format!("invalid workflow id: {id}")).into())
}

fn not_found(id: &WorkflowId) -> anyhow::Error {
    ExitError::new(1, format!("workflow not found: {id}")).into()
}

pub async fn handle(command: WorkflowCommand, ctx: &Context, format: OutputFormat) -> Result<()> {
    match command {
        WorkflowCommand::Start { issue_id } => start(ctx, issue_id, format),
        WorkflowCommand::List => list(ctx, format),
        WorkflowCommand::Status { id } => status(ctx, &parse_id(&id)?, format),
        WorkflowCommand::Stop { id, timeout } => {
            let timeout = timeout.map_or_else(|| ctx.config.stop_timeout(), Duration::from_secs);
            stop(ctx, &parse_id(&id)?, timeout, format).await
        }
        WorkflowCommand::Logs { id, lines } => logs(ctx, &parse_id(&id)?, lines, format),
        WorkflowCommand::Wait { id, timeout } => {
            wait(ctx, &parse_id(&id)?, timeout.map(Duration::from_secs), format).await
        }
        WorkflowCommand::Watch { id, poll } => {
            let id = parse_id(&id)?;
            if poll {
                watch(ctx, &id, PollingChangeSource::default(), format).await
            } else {
                watch(ctx, &id, NotifyChangeSource, format).await
            }
        }
        WorkflowCommand::Cleanup { max_age_hours } => {
            let max_age = max_age_hours.map_or_else(|| ctx.config.retention(), cape_core::hours);
            cleanup(ctx, max_age, format)
        }
    }
}

fn start(ctx: &Context, issue_id: i64, format: OutputFormat) -> Result<()> {
    let launcher = ctx.launcher();
    let id = launcher.launch(issue_id)?;
    match format {
        OutputFormat::Text => println!("{id}"),
        OutputFormat::Json => print_json(&serde_json::json!({
            "workflow_id": id,
            "issue_id": issue_id,
            "pid": launcher.pid_of(&id),
        }))?,
    }
    Ok(())
}

fn list(ctx: &Context, format: OutputFormat) -> Result<()> {
    let monitor = ctx.monitor();
    let active = monitor.list_active();
    let now = SystemClock.now();
    match format {
        OutputFormat::Text => {
            let table = list_table(&active, now, crate::color::should_colorize());
            if table.is_empty() {
                println!("No active workflows");
            } else {
                table.render(&mut std::io::stdout());
            }
        }
        OutputFormat::Json => {
            let entries: Vec<StatusEntry<'_>> = active
                .iter()
                .map(|state| StatusEntry::new(state, true, now))
                .collect();
            print_json(&entries)?;
        }
    }
    Ok(())
}

fn status(ctx: &Context, id: &WorkflowId, format: OutputFormat) -> Result<()> {
    let monitor = ctx.monitor();
    let state = monitor.status(id, false).ok_or_else(|| not_found(id))?;
    let entry = StatusEntry::new(&state, monitor.is_running(id), SystemClock.now());
    match format {
        OutputFormat::Text => {
            for line in status_lines(&entry) {
                println!("{line}");
            }
        }
        OutputFormat::Json => print_json(&entry)?,
    }
    Ok(())
}

async fn stop(ctx: &Context, id: &WorkflowId, timeout: Duration, format: OutputFormat) -> Result<()> {
    let launcher = ctx.launcher();
    let state = launcher.store().read(id);
    let has_pid = launcher.pids().read(id).is_some();

    let (stopped, message) = match &state {
        None if !has_pid => return Err(not_found(id)),
        Some(state) if state.is_terminal() => {
            // Finished already; only a leftover PID file needs clearing
            if has_pid {
                launcher.pids().delete(id)?;
            }
            (false, format!("Workflow {id} already {}", state.status))
        }
        _ => {
            if launcher.stop(id, timeout).await {
                (true, format!("Stopped workflow {id}"))
            } else {
                eprintln!("warning: workflow {id} may still be running");
                (false, format!("Could not confirm workflow {id} stopped"))
            }
        }
    };

    match format {
        OutputFormat::Text => println!("{message}"),
        OutputFormat::Json => {
            let status = launcher.store().read(id).map(|s| s.status);
            print_json(&serde_json::json!({
                "workflow_id": id,
                "stopped": stopped,
                "status": status,
            }))?;
        }
    }
    Ok(())
}

fn logs(ctx: &Context, id: &WorkflowId, lines: usize, format: OutputFormat) -> Result<()> {
    let monitor = ctx.monitor();
    let tail = monitor
        .logs(id, lines)
        .ok_or_else(|| ExitError::new(1, format!("no log for workflow {id}")))?;
    match format {
        OutputFormat::Text => {
            for line in &tail {
                println!("{line}");
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "workflow_id": id,
            "log_path": ctx.paths.log_file(id),
            "lines": tail,
        }))?,
    }
    Ok(())
}

async fn wait(
    ctx: &Context,
    id: &WorkflowId,
    timeout: Option<Duration>,
    format: OutputFormat,
) -> Result<()> {
    let monitor = ctx.monitor();
    let result = tokio::select! {
        result = monitor.wait(id, timeout, poll_interval()) => result,
        _ = tokio::signal::ctrl_c() => return Err(ExitError::interrupted().into()),
    };
    let state = result.map_err(|e: WaitError| ExitError::new(1, e.to_string()))?;
    report_final(&state, format)
}

/// Print the final state; a failed workflow exits 1.
fn report_final(state: &WorkflowState, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("Workflow {} {}", state.workflow_id, state.status),
        OutputFormat::Json => print_json(state)?,
    }
    if state.status == cape_core::WorkflowStatus::Failed {
        let reason = state.error_message.as_deref().unwrap_or("unknown error");
        return Err(ExitError::new(1, format!("workflow {} failed: {reason}", state.workflow_id)).into());
    }
    Ok(())
}

async fn watch<S: ChangeSource>(
    ctx: &Context,
    id: &WorkflowId,
    source: S,
    format: OutputFormat,
) -> Result<()> {
    let monitor = ctx.monitor();
    let mut last = monitor.status(id, false).ok_or_else(|| not_found(id))?;
    print_change(&last, format)?;
    if last.is_terminal() {
        return report_final(&last, format);
    }

    let watcher = StateWatcher::with_source(&ctx.paths.state, source);
    let (tx, mut rx) = mpsc::unbounded_channel();
    watcher.register(id.clone(), move |_: &WorkflowId| {
        // Receiver gone means the command is exiting
        let _ = tx.send(());
    });
    watcher.start()?;

    // Periodic re-reads cover events the watcher debounced away
    let mut poller = Poller::new(poll_interval());
    loop {
        tokio::select! {
            _ = rx.recv() => {}
            tick = poller.tick() => {
                if tick == Tick::Interrupted {
                    watcher.stop();
                    return Err(ExitError::interrupted().into());
                }
            }
        }
        let Some(state) = monitor.status(id, false) else {
            watcher.stop();
            return Err(ExitError::new(1, format!("workflow {id} disappeared")).into());
        };
        if is_change(&last, &state) {
            print_change(&state, format)?;
        }
        if state.is_terminal() {
            watcher.stop();
            return report_final(&state, format);
        }
        last = state;
    }
}

fn cleanup(ctx: &Context, max_age: Duration, format: OutputFormat) -> Result<()> {
    let pids = PidRegistry::new(&ctx.paths.runtime, UnixProcessProbe);
    let store = cape_storage::StateStore::new(&ctx.paths.state);
    let report = run_cleanup(&pids, &store, max_age);
    match format {
        OutputFormat::Text => {
            for line in cleanup_lines(&report) {
                println!("{line}");
            }
        }
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

// ── Rendering ───────────────────────────────────────────────────────────────

/// A state record with liveness and elapsed time.
#[derive(Serialize)]
pub(crate) struct StatusEntry<'a> {
    #[serde(flatten)]
    pub state: &'a WorkflowState,
    pub running: bool,
    pub elapsed_seconds: u64,
    pub elapsed: String,
}

impl<'a> StatusEntry<'a> {
    pub(crate) fn new(state: &'a WorkflowState, running: bool, now: NaiveDateTime) -> Self {
        // A finished workflow's clock stops at its last update
        let end = if state.is_terminal() {
            state.updated_at
        } else {
            now
        };
        let elapsed_seconds = state.elapsed_secs(end);
        Self {
            state,
            running,
            elapsed_seconds,
            elapsed: format_hms(elapsed_seconds),
        }
    }
}

pub(crate) fn list_table(states: &[WorkflowState], now: NaiveDateTime, colorize: bool) -> Table {
    let mut table = Table::with_color(
        vec![
            Column::muted("ID"),
            Column::right("ISSUE"),
            Column::status("STATUS"),
            Column::left("STEP").with_max(24),
            Column::right("PID"),
            Column::left("ELAPSED"),
        ],
        colorize,
    );
    for state in states {
        let entry = StatusEntry::new(state, true, now);
        table.row(vec![
            state.workflow_id.to_string(),
            state.issue_id.to_string(),
            state.status.to_string(),
            or_dash(state.current_step.as_deref()),
            state.pid.to_string(),
            entry.elapsed,
        ]);
    }
    table
}

pub(crate) fn status_lines(entry: &StatusEntry<'_>) -> Vec<String> {
    let state = entry.state;
    let process = if entry.running { "alive" } else { "not running" };
    let mut lines = vec![
        format!("Workflow: {}", state.workflow_id),
        format!("Issue:    {}", state.issue_id),
        format!("Status:   {}", crate::color::status(state.status.as_str())),
        format!("Step:     {}", or_dash(state.current_step.as_deref())),
        format!("PID:      {} ({process})", state.pid),
        format!("Started:  {}", state.started_at.format(cape_core::workflow::timestamp::FORMAT)),
        format!("Updated:  {}", state.updated_at.format(cape_core::workflow::timestamp::FORMAT)),
        format!("Elapsed:  {}", entry.elapsed),
    ];
    if let Some(error) = &state.error_message {
        lines.push(format!("Error:    {error}"));
    }
    lines
}

fn is_change(before: &WorkflowState, after: &WorkflowState) -> bool {
    before.status != after.status
        || before.current_step != after.current_step
        || before.error_message != after.error_message
}

pub(crate) fn change_line(state: &WorkflowState) -> String {
    let time = state.updated_at.format("%H:%M:%S");
    match &state.current_step {
        Some(step) => format!("[{time}] {} ({step})", state.status),
        None => format!("[{time}] {}", state.status),
    }
}

fn print_change(state: &WorkflowState, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", change_line(state)),
        OutputFormat::Json => print_json_line(state)?,
    }
    Ok(())
}

pub(crate) fn cleanup_lines(report: &CleanupReport) -> Vec<String> {
    if report.is_empty() {
        return vec!["Nothing to clean up".to_string()];
    }
    let sections = [
        (&report.stale, "Removed stale PID files"),
        (&report.orphaned, "Marked orphaned workflows failed"),
        (&report.expired, "Deleted expired workflows"),
    ];
    let mut lines = Vec::new();
    for (ids, label) in sections {
        if !ids.is_empty() {
            lines.push(format!("{label}: {}", ids.len()));
            lines.extend(ids.iter().map(|id| format!("  {id}")));
        }
    }
    lines
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
