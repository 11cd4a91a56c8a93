//! Agent invocation boundary.
//!
//! The engine does not understand source code; it sends a task description
//! plus repository context to an external agent tool and observes only the
//! completion signal and the mutated working tree. No assumption about the
//! agent's determinism or correctness is encoded here.

use async_trait::async_trait;
use crank_core::{CrankError, Result, Task};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Repository context handed to the agent alongside the task.
#[derive(Debug, Clone)]
pub struct RepositoryContext {
    pub workdir: PathBuf,
    /// Contents of the configured prompt preamble file, if any.
    pub prompt_preamble: Option<String>,
}

/// What the agent reported back. The working tree is the real output;
/// this is only the completion signal.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub output: String,
}

/// Seam for the external "implement this task" step.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn implement(&self, task: &Task, ctx: &RepositoryContext) -> Result<AgentOutcome>;
}

/// Invoker that spawns the configured agent tool as a child process and
/// blocks until it exits or times out.
pub struct ProcessAgentInvoker {
    tool: String,
    timeout: Duration,
}

impl ProcessAgentInvoker {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            timeout: DEFAULT_AGENT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_prompt(task: &Task, ctx: &RepositoryContext) -> String {
        let mut prompt = String::new();
        if let Some(preamble) = &ctx.prompt_preamble {
            prompt.push_str(preamble);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&format!(
            "Implement the following task in this repository.\n\nTask {}: {}\n",
            task.id, task.title
        ));
        prompt
    }
}

#[async_trait]
impl AgentInvoker for ProcessAgentInvoker {
    async fn implement(&self, task: &Task, ctx: &RepositoryContext) -> Result<AgentOutcome> {
        let prompt = Self::build_prompt(task, ctx);
        info!("Invoking agent '{}' for task {}", self.tool, task.id);
        debug!("Prompt length: {} chars", prompt.len());

        let child = Command::new(&self.tool)
            .arg("-p")
            .arg(&prompt)
            .current_dir(&ctx.workdir)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CrankError::AgentInvocation(format!(
                    "failed to spawn '{}': {}",
                    self.tool, e
                )))
            }
            Err(_) => {
                warn!("Agent timed out after {} seconds", self.timeout.as_secs());
                return Err(CrankError::AgentInvocation(format!(
                    "'{}' timed out after {} seconds",
                    self.tool,
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CrankError::AgentInvocation(format!(
                "'{}' exited with {}: {}",
                self.tool,
                output.status,
                stderr.trim()
            )));
        }

        Ok(AgentOutcome {
            output: String::from_utf8_lossy(&output.stdout).to_string(),
        })
    }
}
