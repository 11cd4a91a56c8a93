//! Pure task selection.
//!
//! `select_next` is deterministic and side-effect free so scheduling
//! decisions can be tested without touching storage: pending tasks whose
//! dependencies are all satisfied, ordered by priority then id.

use crank_core::{Task, TaskStatus};
use std::collections::HashMap;

/// Pick the next eligible task, or `None` when no resolvable work remains.
///
/// A dependency is satisfied only by `completed` or `skipped`; `blocked`
/// never satisfies a dependent.
pub fn select_next(tasks: &[Task]) -> Option<&Task> {
    let status_by_id: HashMap<&str, TaskStatus> =
        tasks.iter().map(|t| (t.id.as_str(), t.status)).collect();

    let mut eligible: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .filter(|t| {
            t.depends_on.iter().all(|dep| {
                status_by_id
                    .get(dep.as_str())
                    .is_some_and(|s| s.satisfies_dependency())
            })
        })
        .collect();

    eligible.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
    eligible.first().copied()
}

/// Tasks that cannot be resolved without operator intervention.
#[derive(Debug, Clone, Default)]
pub struct UnresolvedReport {
    /// Tasks explicitly marked blocked.
    pub blocked: Vec<String>,
    /// Pending tasks whose dependency chain passes through a blocked,
    /// stalled, or unknown task, so they will never become eligible.
    pub unsatisfiable: Vec<String>,
    /// Tasks stuck in_progress (a failed attempt awaiting reset/blocking).
    pub stalled: Vec<String>,
}

impl UnresolvedReport {
    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty() && self.unsatisfiable.is_empty() && self.stalled.is_empty()
    }
}

/// Report leftover work after the scheduler returns none. These tasks are
/// surfaced to the operator rather than silently dropped.
///
/// Satisfiability is transitive: at this point the scheduler has nothing
/// to hand out, so a pending dependency can only ever resolve if its own
/// chain can, and an in_progress dependency is stalled for good.
pub fn unresolved(tasks: &[Task]) -> UnresolvedReport {
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    // Whether the task behind `id` can still end up satisfying dependents.
    fn satisfiable<'a>(
        id: &'a str,
        by_id: &HashMap<&'a str, &'a Task>,
        memo: &mut HashMap<&'a str, bool>,
    ) -> bool {
        if let Some(&known) = memo.get(id) {
            return known;
        }
        let verdict = match by_id.get(id) {
            None => false,
            Some(task) => match task.status {
                TaskStatus::Completed | TaskStatus::Skipped => true,
                TaskStatus::Blocked | TaskStatus::InProgress => false,
                TaskStatus::Pending => task
                    .depends_on
                    .iter()
                    .all(|dep| satisfiable(dep, by_id, memo)),
            },
        };
        memo.insert(id, verdict);
        verdict
    }

    let mut memo = HashMap::new();
    let mut report = UnresolvedReport::default();
    for task in tasks {
        match task.status {
            TaskStatus::Blocked => report.blocked.push(task.id.clone()),
            TaskStatus::InProgress => report.stalled.push(task.id.clone()),
            TaskStatus::Pending => {
                let stuck = task
                    .depends_on
                    .iter()
                    .any(|dep| !satisfiable(dep, &by_id, &mut memo));
                if stuck {
                    report.unsatisfiable.push(task.id.clone());
                }
            }
            _ => {}
        }
    }
    report
}
