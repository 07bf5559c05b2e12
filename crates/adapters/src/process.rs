// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix process probing via `kill(2)` and `/proc`.

use cape_core::{ProcessId, ProcessInfo, ProcessProbe, Signal};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal as NixSignal};
use nix::unistd::Pid;

/// Liveness probe for real OS processes.
///
/// A null signal tests existence: `ESRCH` means gone, `EPERM` means the
/// process exists under another user. On Linux a zombie counts as dead,
/// since it will never do more work and only awaits reaping.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixProcessProbe;

impl ProcessProbe for UnixProcessProbe {
    fn is_alive(&self, pid: ProcessId) -> bool {
        if pid <= 0 {
            return false;
        }
        let exists = match signal::kill(Pid::from_raw(pid), None) {
            Ok(()) | Err(Errno::EPERM) => true,
            Err(_) => false,
        };
        exists && !is_zombie(pid)
    }

    fn send(&self, pid: ProcessId, sig: Signal) -> bool {
        if pid <= 0 {
            return false;
        }
        match signal::kill(Pid::from_raw(pid), to_nix(sig)) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(pid, signal = ?sig, error = %e, "signal not delivered");
                false
            }
        }
    }

    fn info(&self, pid: ProcessId) -> Option<ProcessInfo> {
        if !self.is_alive(pid) {
            return None;
        }
        proc_info(pid).or_else(|| ps_info(pid))
    }
}

fn to_nix(sig: Signal) -> NixSignal {
    match sig {
        Signal::Terminate => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
        Signal::Interrupt => NixSignal::SIGINT,
    }
}

/// Fields of `/proc/<pid>/stat` that the probe uses.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ProcStat {
    pub comm: String,
    pub state: char,
    /// Clock ticks after boot
    pub start_ticks: Option<u64>,
}

/// Parse a stat line. `comm` may itself contain spaces and parentheses, so
/// the fixed fields are taken after the *last* `)`.
pub(crate) fn parse_stat(stat: &str) -> Option<ProcStat> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    let comm = stat.get(open + 1..close)?.to_string();
    let fields: Vec<&str> = stat.get(close + 1..)?.split_whitespace().collect();
    let state = fields.first()?.chars().next()?;
    let start_ticks = fields.get(19).and_then(|s| s.parse().ok());
    Some(ProcStat {
        comm,
        state,
        start_ticks,
    })
}

#[cfg(target_os = "linux")]
fn read_stat(pid: ProcessId) -> Option<ProcStat> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    parse_stat(&stat)
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: ProcessId) -> bool {
    read_stat(pid).is_some_and(|s| s.state == 'Z')
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: ProcessId) -> bool {
    false
}

#[cfg(target_os = "linux")]
fn proc_info(pid: ProcessId) -> Option<ProcessInfo> {
    let stat = read_stat(pid)?;
    let cmdline = std::fs::read(format!("/proc/{}/cmdline", pid))
        .ok()
        .map(|raw| {
            raw.split(|b| *b == 0)
                .filter(|part| !part.is_empty())
                .map(|part| String::from_utf8_lossy(part).into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|s| !s.is_empty())
        // Kernel threads have an empty cmdline
        .unwrap_or_else(|| format!("[{}]", stat.comm));
    let start_time = stat.start_ticks.and_then(start_time_from_ticks);
    Some(ProcessInfo {
        pid,
        cmdline,
        status: stat.state.to_string(),
        start_time,
    })
}

#[cfg(not(target_os = "linux"))]
fn proc_info(_pid: ProcessId) -> Option<ProcessInfo> {
    None
}

#[cfg(target_os = "linux")]
fn start_time_from_ticks(ticks: u64) -> Option<String> {
    use nix::unistd::{sysconf, SysconfVar};

    let per_sec = sysconf(SysconfVar::CLK_TCK).ok().flatten()?;
    let per_sec = u64::try_from(per_sec).ok().filter(|t| *t > 0)?;
    let boot = std::fs::read_to_string("/proc/stat")
        .ok()?
        .lines()
        .find_map(|line| line.strip_prefix("btime "))
        .and_then(|s| s.trim().parse::<i64>().ok())?;
    let secs = boot.checked_add(i64::try_from(ticks / per_sec).ok()?)?;
    let at = chrono::DateTime::from_timestamp(secs, 0)?;
    Some(
        at.with_timezone(&chrono::Local)
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string(),
    )
}

/// Parse `ps -o stat= -o lstart= -o command=` output.
///
/// `lstart` is always five tokens (`Fri Mar 15 14:30:45 2024`).
pub(crate) fn parse_ps_line(pid: ProcessId, line: &str) -> Option<ProcessInfo> {
    let mut tokens = line.split_whitespace();
    let status = tokens.next()?.chars().next()?.to_string();
    let start: Vec<&str> = tokens.by_ref().take(5).collect();
    if start.len() < 5 {
        return None;
    }
    let cmdline = tokens.collect::<Vec<_>>().join(" ");
    Some(ProcessInfo {
        pid,
        cmdline,
        status,
        start_time: Some(start.join(" ")),
    })
}

fn ps_info(pid: ProcessId) -> Option<ProcessInfo> {
    let output = std::process::Command::new("ps")
        .args(["-o", "stat=", "-o", "lstart=", "-o", "command=", "-p"])
        .arg(pid.to_string())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    parse_ps_line(pid, text.lines().next()?)
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
