//! Commit creation with conventional-commit messages derived from tasks.

use crate::git::GitExecutor;
use crank_core::{CrankError, Result, Task};
use tracing::{debug, info};

/// Wraps commit creation. Fails with `NothingToCommit` when the working
/// tree is clean, which usually means the agent claimed completion without
/// making changes.
pub struct CommitManager<E: GitExecutor> {
    executor: E,
}

impl<E: GitExecutor> CommitManager<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Stage everything and commit with a `type(scope): <id> - <title>`
    /// message. Returns the new revision id.
    pub async fn commit(&self, task: &Task) -> Result<String> {
        let add = self.executor.exec(&["add", "-A"]).await?;
        if !add.success {
            return Err(CrankError::GitCommand(format!(
                "git add failed: {}",
                add.stderr
            )));
        }

        let status = self.executor.exec(&["status", "--porcelain"]).await?;
        if !status.success {
            return Err(CrankError::GitCommand(format!(
                "git status failed: {}",
                status.stderr
            )));
        }
        if status.stdout.trim().is_empty() {
            return Err(CrankError::NothingToCommit(task.id.clone()));
        }

        let message = commit_message(task);
        debug!("Committing with message: {}", message);

        let commit = self.executor.exec(&["commit", "-m", &message]).await?;
        if !commit.success {
            return Err(CrankError::GitCommand(format!(
                "git commit failed: {}",
                commit.stderr
            )));
        }

        let rev = self.executor.exec(&["rev-parse", "HEAD"]).await?;
        if !rev.success {
            return Err(CrankError::GitCommand(format!(
                "git rev-parse failed: {}",
                rev.stderr
            )));
        }

        let sha = rev.stdout.trim().to_string();
        info!("Committed task {} as {}", task.id, sha);
        Ok(sha)
    }
}

/// Derive a conventional-commit message from the task.
///
/// The type comes from keywords in the title (default `feat`); the scope
/// is the task id root (`"3.2"` -> `"3"`).
pub fn commit_message(task: &Task) -> String {
    let lower = task.title.to_lowercase();
    let commit_type = if lower.starts_with("fix") || lower.contains("bug") {
        "fix"
    } else if lower.starts_with("test") || lower.contains("test coverage") {
        "test"
    } else if lower.starts_with("document") || lower.starts_with("docs") {
        "docs"
    } else if lower.starts_with("refactor") {
        "refactor"
    } else if lower.starts_with("chore") || lower.starts_with("clean") {
        "chore"
    } else {
        "feat"
    };

    let scope = task.id.split('.').next().unwrap_or(&task.id);
    format!("{}({}): {} - {}", commit_type, scope, task.id, task.title)
}
