//! On-disk schema for the versioned task-store document.
//!
//! The store is a single JSON document holding project metadata, the run
//! configuration, the task graph, and a derived progress summary. Load-time
//! validation enforces id uniqueness, dependency acyclicity, and the
//! commit/status pairing invariant.

use crate::{CrankError, Result, Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Current document schema version.
pub const SCHEMA_VERSION: &str = "1";

/// Project metadata. Immutable after creation except `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Reference to the requirements document the tasks were derived from.
    #[serde(default)]
    pub source_prd: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectMeta {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: String::new(),
            source_prd: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Run configuration. Owned by the operator; read-only during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum iterations before the loop stops.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Ordered shell commands that must all succeed before a commit.
    #[serde(default = "default_quality_checks")]
    pub quality_checks: Vec<String>,

    /// External agent tool invoked to implement a task.
    #[serde(default = "default_ai_tool")]
    pub ai_tool: String,

    /// Optional prompt preamble file passed to the agent.
    #[serde(default)]
    pub ai_prompt_file: Option<String>,

    /// Advisory sandboxing mode. Not enforced by the engine.
    #[serde(default)]
    pub sandbox: Option<String>,
}

fn default_max_iterations() -> u32 {
    20
}

fn default_quality_checks() -> Vec<String> {
    vec!["cargo check".to_string(), "cargo test".to_string()]
}

fn default_ai_tool() -> String {
    "claude".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            quality_checks: default_quality_checks(),
            ai_tool: default_ai_tool(),
            ai_prompt_file: None,
            sandbox: None,
        }
    }
}

/// Overall project status derived from task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    InProgress,
    /// Everything completed or skipped.
    Completed,
    /// No resolvable work left but blocked tasks remain.
    Partial,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

/// Derived progress counters, recomputed on every save.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub status: ProjectStatus,
}

/// The persisted task-store document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocument {
    pub version: String,
    pub project: ProjectMeta,
    pub config: RunConfig,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub progress: ProgressSummary,
}

impl StoreDocument {
    pub fn new(project: ProjectMeta, config: RunConfig, tasks: Vec<Task>) -> Self {
        let mut doc = Self {
            version: SCHEMA_VERSION.to_string(),
            project,
            config,
            tasks,
            progress: ProgressSummary::default(),
        };
        doc.recompute_progress();
        doc
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| CrankError::TaskNotFound(id.to_string()))
    }

    /// Recompute the derived progress counters from the task list.
    pub fn recompute_progress(&mut self) {
        let total = self.tasks.len() as u32;
        let completed = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count() as u32;

        let all_terminal = self.tasks.iter().all(|t| t.status.is_terminal());
        let any_blocked = self
            .tasks
            .iter()
            .any(|t| t.status == TaskStatus::Blocked);

        self.progress = ProgressSummary {
            total_tasks: total,
            completed_tasks: completed,
            status: if !all_terminal {
                ProjectStatus::InProgress
            } else if any_blocked {
                ProjectStatus::Partial
            } else {
                ProjectStatus::Completed
            },
        };
    }

    /// Validate all document invariants: unique ids, resolvable and acyclic
    /// dependencies, and per-task commit/status pairing.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            task.validate()?;
            if !seen.insert(task.id.as_str()) {
                return Err(CrankError::CorruptState(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
        }

        for task in &self.tasks {
            for dep in &task.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(CrankError::CorruptState(format!(
                        "task '{}' depends on unknown task '{}'",
                        task.id, dep
                    )));
                }
            }
        }

        self.check_acyclic()
    }

    /// Depth-first cycle detection over the depends_on relation.
    fn check_acyclic(&self) -> Result<()> {
        let by_id: HashMap<&str, &Task> =
            self.tasks.iter().map(|t| (t.id.as_str(), t)).collect();

        // 0 = unvisited, 1 = on stack, 2 = done
        let mut state: HashMap<&str, u8> = HashMap::new();

        fn visit<'a>(
            id: &'a str,
            by_id: &HashMap<&'a str, &'a Task>,
            state: &mut HashMap<&'a str, u8>,
        ) -> Result<()> {
            match state.get(id) {
                Some(1) => return Err(CrankError::DependencyCycle(id.to_string())),
                Some(2) => return Ok(()),
                _ => {}
            }
            state.insert(id, 1);
            if let Some(task) = by_id.get(id) {
                for dep in &task.depends_on {
                    visit(dep, by_id, state)?;
                }
            }
            state.insert(id, 2);
            Ok(())
        }

        for task in &self.tasks {
            visit(task.id.as_str(), &by_id, &mut state)?;
        }
        Ok(())
    }
}
