//! Test helpers for behavioral specifications.
//!
//! Runs the built `cape` and `cape-workflow` binaries against an isolated
//! data directory.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

// Fast polling so wait/watch specs finish quickly
const CAPE_WAIT_POLL_MS: &str = "20";

// Spec polling timeouts
pub const SPEC_POLL_INTERVAL_MS: u64 = 10;
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// Far above any real pid_max
pub const DEAD_PID: i32 = 999_999_999;

/// Returns the path to a binary, checking the llvm-cov target directory
/// first and falling back to the directory holding the test binary.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // target/debug/deps/specs-<hash> -> target/debug/
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

pub fn cape_binary() -> PathBuf {
    binary_path("cape")
}

pub fn daemon_binary() -> PathBuf {
    binary_path("cape-workflow")
}

/// Fluent builder around one binary invocation.
pub struct CliBuilder {
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl CliBuilder {
    /// Invoke `cape-workflow` directly
    pub fn daemon() -> Self {
        Self::new(daemon_binary())
    }

    fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            envs: vec![
                (
                    "CAPE_DAEMON_BINARY".into(),
                    daemon_binary().to_string_lossy().into(),
                ),
                ("CAPE_WAIT_POLL_MS".into(), CAPE_WAIT_POLL_MS.into()),
                ("NO_COLOR".into(), "1".into()),
            ],
        }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<Path>) -> Self {
        self.envs.push((
            key.to_string(),
            value.as_ref().to_string_lossy().to_string(),
        ));
        self
    }

    /// Build the command without running it
    pub fn command(self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        // Keep the caller's layout from leaking into the spec
        cmd.env_remove("CAPE_DATA_DIR");
        cmd.env_remove("CAPE_RUNTIME_DIR");
        cmd.env_remove("RUST_LOG");
        for (key, value) in self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    fn output(self) -> Output {
        self.command().output().expect("command should run")
    }

    /// Run and expect exit code 0
    pub fn passes(self) -> RunAssert {
        let output = self.output();
        assert!(
            output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    /// Run and expect a non-zero exit code
    pub fn fails(self) -> RunAssert {
        let output = self.output();
        assert!(
            !output.status.success(),
            "expected command to fail, but it passed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }
}

/// Result of a run for chaining assertions
pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    /// Assert the exact exit code.
    pub fn code(self, expected: i32) -> Self {
        assert_eq!(
            self.output.status.code(),
            Some(expected),
            "unexpected exit code\nstdout: {}\nstderr: {}",
            self.stdout(),
            self.stderr()
        );
        self
    }

    /// Assert stdout equals expected exactly (with diff on failure).
    pub fn stdout_eq(self, expected: &str) -> Self {
        similar_asserts::assert_eq!(self.stdout(), expected);
        self
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout does not contain '{}'\nstdout: {}",
            expected,
            stdout
        );
        self
    }

    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            !stdout.contains(unexpected),
            "stdout should not contain '{}'\nstdout: {}",
            unexpected,
            stdout
        );
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr does not contain '{}'\nstderr: {}",
            expected,
            stderr
        );
        self
    }

    /// Parse stdout as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout()).unwrap_or_else(|e| {
            panic!("stdout is not JSON: {e}\nstdout: {}", self.stdout())
        })
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Poll a condition until it returns true or timeout is reached.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(timeout_ms);
    let poll_interval = std::time::Duration::from_millis(SPEC_POLL_INTERVAL_MS);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll_interval);
    }
    false
}

// =============================================================================
// Home
// =============================================================================

/// Isolated Cape data directory.
pub struct Home {
    dir: tempfile::TempDir,
}

impl Home {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Home whose config runs the given `[[steps]]` TOML.
    pub fn with_config(config: &str) -> Self {
        let home = Self::empty();
        std::fs::write(home.path().join("config.toml"), config).unwrap();
        home
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run `cape` against this home
    pub fn cape(&self) -> CliBuilder {
        CliBuilder::new(cape_binary()).env("CAPE_DATA_DIR", self.path())
    }

    /// Start a workflow and return its id
    pub fn start(&self, issue_id: i64) -> String {
        let out = self
            .cape()
            .args(&["workflow", "start", &issue_id.to_string()])
            .passes()
            .stdout();
        out.trim().to_string()
    }

    /// Raw state record, if present
    pub fn state(&self, id: &str) -> Option<serde_json::Value> {
        let text = std::fs::read_to_string(self.state_file(id)).ok()?;
        serde_json::from_str(&text).ok()
    }

    pub fn status_of(&self, id: &str) -> Option<String> {
        self.state(id)
            .and_then(|s| s["status"].as_str().map(String::from))
    }

    pub fn state_file(&self, id: &str) -> PathBuf {
        self.path().join("state").join(format!("{id}.json"))
    }

    pub fn pid_file(&self, id: &str) -> PathBuf {
        self.path().join("pids").join(format!("{id}.pid"))
    }

    pub fn log(&self, id: &str) -> String {
        std::fs::read_to_string(self.path().join("logs").join(format!("{id}.log")))
            .unwrap_or_else(|_| "(no workflow log)".to_string())
    }

    /// Write a record directly, bypassing the CLI
    pub fn write_state(&self, id: &str, status: &str, pid: i32, updated_at: &str) {
        let dir = self.path().join("state");
        std::fs::create_dir_all(&dir).unwrap();
        let record = serde_json::json!({
            "workflow_id": id,
            "issue_id": 7,
            "status": status,
            "current_step": null,
            "pid": pid,
            "started_at": "2024-01-01T00:00:00",
            "updated_at": updated_at,
            "error_message": null,
        });
        std::fs::write(self.state_file(id), record.to_string()).unwrap();
    }

    pub fn write_pid(&self, id: &str, pid: i32) {
        let dir = self.path().join("pids");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(self.pid_file(id), pid.to_string()).unwrap();
    }
}

impl Drop for Home {
    fn drop(&mut self) {
        // Kill any daemon a spec left running
        let Ok(entries) = std::fs::read_dir(self.path().join("pids")) else {
            return;
        };
        for entry in entries.flatten() {
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            if let Ok(pid) = content.trim().parse::<u32>() {
                let _ = Command::new("kill")
                    .args(["-9", &pid.to_string()])
                    .stdout(std::process::Stdio::null())
                    .stderr(std::process::Stdio::null())
                    .status();
            }
        }
    }
}

/// Steps that finish immediately and leave a trace in the log.
pub const ECHO_STEPS: &str = r#"
[[steps]]
name = "planning"
command = "echo planning for $CAPE_ISSUE_ID"

[[steps]]
name = "implementing"
command = "echo implementing $CAPE_STEP"
"#;

/// A step that runs until stopped.
pub const SLOW_STEPS: &str = r#"
[[steps]]
name = "implementing"
command = "sleep 30"
"#;

/// A step that exits non-zero.
pub const FAILING_STEPS: &str = r#"
[[steps]]
name = "planning"
command = "exit 3"
"#;
