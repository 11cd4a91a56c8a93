//! Shelling out to git.
//!
//! Commit creation is the only thing the engine needs git for, so the
//! seam is a single `exec` method; everything above it can be driven by
//! a canned executor in tests.

use async_trait::async_trait;
use crank_core::{CrankError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Captured result of one git invocation.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl GitOutput {
    fn capture(output: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        }
    }
}

/// Boundary between commit creation and the git binary.
#[async_trait]
pub trait GitExecutor: Send + Sync {
    async fn exec(&self, args: &[&str]) -> Result<GitOutput>;
}

/// Executor that runs the real git binary inside a repository root.
#[derive(Clone, Debug)]
pub struct GitCommand {
    root: PathBuf,
}

impl GitCommand {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the repository root enclosing `dir` and anchor the
    /// executor there, so commits land in the real repository even when
    /// `dir` points at a subdirectory.
    pub async fn detect_in(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(dir)
            .output()
            .await
            .map_err(|e| CrankError::GitCommand(format!("failed to run git: {}", e)))?;

        if !output.status.success() {
            return Err(CrankError::GitCommand(format!(
                "{} is not inside a git repository",
                dir.display()
            )));
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl GitExecutor for GitCommand {
    async fn exec(&self, args: &[&str]) -> Result<GitOutput> {
        debug!("git {:?} in {}", args, self.root.display());

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|e| CrankError::GitCommand(format!("failed to run git: {}", e)))?;

        Ok(GitOutput::capture(output))
    }
}

/// Canned executor: replays configured responses keyed by the full
/// argument string and records every call for order assertions.
#[derive(Default)]
pub struct MockGitExecutor {
    responses: std::collections::HashMap<String, GitOutput>,
    calls: std::sync::Mutex<Vec<String>>,
}

impl MockGitExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, command: &str, output: GitOutput) -> Self {
        self.responses.insert(command.to_string(), output);
        self
    }

    /// Shorthand for a successful response with the given stdout.
    pub fn with_ok(self, command: &str, stdout: &str) -> Self {
        self.with_response(
            command,
            GitOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                success: true,
            },
        )
    }

    /// Every command executed so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl GitExecutor for MockGitExecutor {
    async fn exec(&self, args: &[&str]) -> Result<GitOutput> {
        let key = args.join(" ");
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.clone());
        self.responses
            .get(&key)
            .cloned()
            .ok_or_else(|| CrankError::GitCommand(format!("no canned response for: {}", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_mock_replays_and_records() {
        let executor = MockGitExecutor::new().with_ok("rev-parse HEAD", "abc123\n");

        let output = executor.exec(&["rev-parse", "HEAD"]).await.unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "abc123");
        assert_eq!(executor.calls(), vec!["rev-parse HEAD"]);
    }

    #[tokio::test]
    async fn test_mock_missing_response_is_error() {
        let executor = MockGitExecutor::new();
        assert!(executor.exec(&["status"]).await.is_err());
        // The attempt is still recorded.
        assert_eq!(executor.calls(), vec!["status"]);
    }

    #[tokio::test]
    async fn test_detect_rejects_non_repository() {
        let dir = TempDir::new().unwrap();
        let err = GitCommand::detect_in(dir.path()).await.unwrap_err();
        assert!(matches!(err, CrankError::GitCommand(_)));
        assert!(err.to_string().contains("not inside a git repository"));
    }
}
