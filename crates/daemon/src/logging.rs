// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workflow log file setup.

use std::io::Write;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

/// Prefix of the line written before logging starts.
/// Full format: "--- cape-workflow: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- cape-workflow: starting (pid: ";

pub(crate) fn open_append(log_path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = log_path.parent() {
        cape_core::paths::ensure_dir(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
}

pub fn startup_marker(pid: u32) -> String {
    format!("{STARTUP_MARKER_PREFIX}{pid}) ---")
}

/// Append the startup marker for this process.
pub fn write_startup_marker(log_path: &Path) -> std::io::Result<()> {
    let mut file = open_append(log_path)?;
    writeln!(file, "{}", startup_marker(std::process::id()))
}

/// Append an error synchronously; the non-blocking writer may not flush
/// before an early exit.
pub fn write_startup_error(log_path: &Path, error: &dyn std::fmt::Display) {
    let Ok(mut file) = open_append(log_path) else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start workflow: {error}");
}

/// Route `tracing` into `log_path`. The returned guard flushes on drop.
pub fn setup_logging(log_path: &Path) -> std::io::Result<WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let invalid = || std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid log path");
    let dir = log_path.parent().ok_or_else(invalid)?;
    let file_name = log_path.file_name().ok_or_else(invalid)?;
    cape_core::paths::ensure_dir(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
