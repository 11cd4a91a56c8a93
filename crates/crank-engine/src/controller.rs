//! The iteration controller.
//!
//! Drives the full cycle: load state, ask the scheduler for the next
//! eligible task, mark it in_progress, invoke the agent, run the quality
//! gate, commit, persist, journal, repeat. Each iteration starts from
//! freshly loaded state; nothing is carried in memory between iterations
//! except the counter.

use crate::agent::{AgentInvoker, RepositoryContext};
use crate::commit::CommitManager;
use crate::gate::QualityGate;
use crate::git::GitExecutor;
use crate::scheduler::{select_next, unresolved, UnresolvedReport};
use crank_core::{CrankError, EntryKind, ProgressEntry, Result, StoreDocument, TaskStatus};
use crank_store::{ProgressLog, TaskStore};
use tracing::{info, warn};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Scheduler returned none and nothing is left pending, stalled, or
    /// blocked.
    AllDone,
    /// Scheduler returned none but unresolvable tasks remain.
    Partial,
    /// The iteration cap stopped the loop with work still outstanding.
    IterationCapReached,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub iterations_run: u32,
    pub tasks_completed: u32,
    pub outcome: RunOutcome,
    pub leftover: UnresolvedReport,
}

/// Orchestrates iterations against a single store and working tree.
pub struct IterationController<E: GitExecutor, A: AgentInvoker> {
    store: TaskStore,
    log: ProgressLog,
    gate: QualityGate,
    commits: CommitManager<E>,
    invoker: A,
    ctx: RepositoryContext,
}

impl<E: GitExecutor, A: AgentInvoker> IterationController<E, A> {
    pub fn new(
        store: TaskStore,
        log: ProgressLog,
        gate: QualityGate,
        commits: CommitManager<E>,
        invoker: A,
        ctx: RepositoryContext,
    ) -> Self {
        Self {
            store,
            log,
            gate,
            commits,
            invoker,
            ctx,
        }
    }

    /// Run up to `max_iterations` iterations (pass `None` to use the
    /// store's configured cap).
    ///
    /// Recoverable failures (agent errors, gate failures, empty commits)
    /// are journaled and the loop moves on; corrupt state and write
    /// conflicts halt the run.
    pub async fn run(&mut self, max_iterations: Option<u32>) -> Result<RunReport> {
        let mut completed: u32 = 0;
        let mut iteration: u32 = 0;

        let cap = match max_iterations {
            Some(n) => n,
            None => self.store.load().await?.config.max_iterations,
        };

        loop {
            iteration += 1;
            if iteration > cap {
                info!("Iteration cap ({}) reached", cap);
                let doc = self.store.load().await?;
                return Ok(RunReport {
                    iterations_run: iteration - 1,
                    tasks_completed: completed,
                    outcome: RunOutcome::IterationCapReached,
                    leftover: unresolved(&doc.tasks),
                });
            }

            info!("=== Iteration {} of {} ===", iteration, cap);
            let mut doc = self.store.load().await?;

            let task_id = match select_next(&doc.tasks) {
                Some(task) => task.id.clone(),
                None => {
                    let leftover = unresolved(&doc.tasks);
                    let outcome = if leftover.is_empty() {
                        RunOutcome::AllDone
                    } else {
                        RunOutcome::Partial
                    };
                    self.journal_termination(iteration, &leftover).await?;
                    return Ok(RunReport {
                        iterations_run: iteration - 1,
                        tasks_completed: completed,
                        outcome,
                        leftover,
                    });
                }
            };

            // Persist in_progress BEFORE invoking the agent so a crash
            // mid-iteration leaves an accurate, resumable record.
            {
                let task = doc.task_mut(&task_id)?;
                task.transition(TaskStatus::InProgress)?;
                task.iteration = Some(iteration);
            }
            self.store.save(&mut doc).await?;
            self.log
                .append(
                    &ProgressEntry::new(iteration, EntryKind::Started, "implementation attempt")
                        .for_task(&task_id),
                )
                .await?;

            if self.attempt(&mut doc, &task_id, iteration).await? {
                completed += 1;
            }
        }
    }

    /// One implementation attempt for an in_progress task. Returns true
    /// on completion; on any recoverable failure the task stays
    /// in_progress and the failure is journaled.
    async fn attempt(
        &mut self,
        doc: &mut StoreDocument,
        task_id: &str,
        iteration: u32,
    ) -> Result<bool> {
        let task = doc.task(task_id).cloned().ok_or_else(|| {
            CrankError::TaskNotFound(task_id.to_string())
        })?;

        // Agent invocation. Failure leaves the task in_progress: the
        // scheduler's pending-only filter keeps it from being silently
        // retried until an operator resets or blocks it.
        if let Err(e) = self.invoker.implement(&task, &self.ctx).await {
            warn!("Agent invocation failed for {}: {}", task_id, e);
            self.log
                .append(
                    &ProgressEntry::new(iteration, EntryKind::Error, e.to_string())
                        .for_task(task_id),
                )
                .await?;
            self.journal_learning(iteration, task_id, "agent invocation failed; reset or block the task to retry")
                .await?;
            return Ok(false);
        }

        // Quality gate, fail-fast in configured order.
        let report = self.gate.run(&doc.config.quality_checks).await?;
        if !report.passed {
            let failed = report.failed_command.as_deref().unwrap_or("<unknown>");
            self.log
                .append(
                    &ProgressEntry::new(
                        iteration,
                        EntryKind::QualityCheck,
                        format!("failed: {} :: {}", failed, report.output),
                    )
                    .for_task(task_id),
                )
                .await?;
            self.journal_learning(iteration, task_id, "quality gate failed; task left in_progress")
                .await?;
            return Ok(false);
        }

        // Commit. A clean tree means the agent claimed success without
        // changing anything; that is an error, not a completion.
        let sha = match self.commits.commit(&task).await {
            Ok(sha) => sha,
            // NothingToCommit and git plumbing failures are both
            // environmental; journal and leave the task in_progress.
            Err(e) => {
                warn!("Commit failed for {}: {}", task_id, e);
                self.log
                    .append(
                        &ProgressEntry::new(iteration, EntryKind::Error, e.to_string())
                            .for_task(task_id),
                    )
                    .await?;
                return Ok(false);
            }
        };

        {
            let task = doc.task_mut(task_id)?;
            task.transition(TaskStatus::Completed)?;
            task.commit_sha = Some(sha.clone());
            task.iteration = Some(iteration);
        }
        self.store.save(doc).await?;

        self.log
            .append(
                &ProgressEntry::new(iteration, EntryKind::Commit, format!("committed {}", sha))
                    .for_task(task_id),
            )
            .await?;
        self.log
            .append(
                &ProgressEntry::new(
                    iteration,
                    EntryKind::Completed,
                    format!("'{}' completed", doc.task(task_id).map(|t| t.title.as_str()).unwrap_or(task_id)),
                )
                .for_task(task_id),
            )
            .await?;

        info!("Task {} completed as {}", task_id, sha);
        Ok(true)
    }

    async fn journal_learning(&self, iteration: u32, task_id: &str, note: &str) -> Result<()> {
        self.log
            .append(&ProgressEntry::new(iteration, EntryKind::Learning, note).for_task(task_id))
            .await
    }

    async fn journal_termination(&self, iteration: u32, leftover: &UnresolvedReport) -> Result<()> {
        let message = if leftover.is_empty() {
            "no eligible tasks remain; all resolvable work done".to_string()
        } else {
            format!(
                "no eligible tasks remain; blocked: [{}], unsatisfiable: [{}], stalled: [{}]",
                leftover.blocked.join(", "),
                leftover.unsatisfiable.join(", "),
                leftover.stalled.join(", ")
            )
        };
        self.log
            .append(&ProgressEntry::new(iteration, EntryKind::Learning, message))
            .await
    }
}
