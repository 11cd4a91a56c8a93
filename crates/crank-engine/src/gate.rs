//! Quality gate: runs the configured check commands against the working
//! tree, fail-fast, with a per-command timeout.

use crank_core::Result;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);
const OUTPUT_TRUNCATE_CHARS: usize = 4000;

/// Outcome of running the gate.
#[derive(Debug, Clone)]
pub struct GateReport {
    pub passed: bool,
    /// First failing command, if any.
    pub failed_command: Option<String>,
    /// Captured output of the failing command (or empty on pass).
    pub output: String,
}

impl GateReport {
    pub fn pass() -> Self {
        Self {
            passed: true,
            failed_command: None,
            output: String::new(),
        }
    }
}

/// Runs check commands in configured order against a working tree.
pub struct QualityGate {
    workdir: PathBuf,
    timeout: Duration,
}

impl QualityGate {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute each command in order; the first failure stops the
    /// sequence. A timeout counts as a failure of that command. The gate
    /// mutates nothing itself; side effects belong to the commands.
    pub async fn run(&self, commands: &[String]) -> Result<GateReport> {
        for command in commands {
            info!("Quality check: {}", command);
            match self.run_one(command).await {
                CheckOutcome::Passed => continue,
                CheckOutcome::Failed(output) => {
                    warn!("Quality check failed: {}", command);
                    return Ok(GateReport {
                        passed: false,
                        failed_command: Some(command.clone()),
                        output,
                    });
                }
            }
        }
        Ok(GateReport::pass())
    }

    async fn run_one(&self, command: &str) -> CheckOutcome {
        debug!("Running `sh -c {}` in {}", command, self.workdir.display());

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workdir)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) if output.status.success() => CheckOutcome::Passed,
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                CheckOutcome::Failed(truncate(
                    &format!("STDOUT:\n{}\n\nSTDERR:\n{}", stdout.trim(), stderr.trim()),
                    OUTPUT_TRUNCATE_CHARS,
                ))
            }
            Ok(Err(e)) => CheckOutcome::Failed(format!("failed to spawn: {}", e)),
            Err(_) => CheckOutcome::Failed(format!(
                "timed out after {} seconds",
                self.timeout.as_secs()
            )),
        }
    }
}

enum CheckOutcome {
    Passed,
    Failed(String),
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max).collect();
        format!("{}...[truncated]", cut)
    } else {
        s.to_string()
    }
}
