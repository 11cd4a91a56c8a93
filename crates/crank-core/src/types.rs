//! Task graph type definitions.

use crate::{CrankError, Result};
use serde::{Deserialize, Serialize};

/// Task priority levels. Lower rank schedules first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical = 0,
    High = 1,
    #[default]
    Medium = 2,
    Low = 3,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" | "0" => Ok(Self::Critical),
            "high" | "1" => Ok(Self::High),
            "medium" | "2" => Ok(Self::Medium),
            "low" | "3" => Ok(Self::Low),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// Task status.
///
/// `skipped` counts as satisfied for dependency purposes; `blocked` does
/// not and requires manual intervention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Skipped,
    Blocked,
}

impl TaskStatus {
    /// True when this status satisfies a dependent's `depends_on` entry.
    pub fn satisfies_dependency(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    /// True when no further automatic work will happen on this task.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped | Self::Blocked)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" | "inprogress" => Ok(Self::InProgress),
            "completed" | "done" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            "blocked" => Ok(Self::Blocked),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

/// Advisory complexity label. Never consulted by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Invalid complexity: {}", s)),
        }
    }
}

/// A unit of work in the task graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier, unique within the store.
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub complexity: Complexity,
    /// Ids of tasks that must be completed or skipped first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Revision id; present iff status is completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    /// Iteration number at which the task was last touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: TaskStatus::Pending,
            priority: Priority::default(),
            complexity: Complexity::default(),
            depends_on: Vec::new(),
            commit_sha: None,
            iteration: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_depends_on(mut self, deps: Vec<String>) -> Self {
        self.depends_on = deps;
        self
    }

    /// Apply a status transition, enforcing the legal transition set:
    /// pending -> in_progress; in_progress -> {completed, blocked, skipped};
    /// any -> pending (administrative reset, clears commit_sha/iteration).
    pub fn transition(&mut self, to: TaskStatus) -> Result<()> {
        let legal = match (self.status, to) {
            (_, TaskStatus::Pending) => true,
            (TaskStatus::Pending, TaskStatus::InProgress) => true,
            (TaskStatus::InProgress, TaskStatus::Completed)
            | (TaskStatus::InProgress, TaskStatus::Blocked)
            | (TaskStatus::InProgress, TaskStatus::Skipped) => true,
            _ => false,
        };

        if !legal {
            return Err(CrankError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        if to == TaskStatus::Pending {
            self.commit_sha = None;
            self.iteration = None;
        }
        self.status = to;
        Ok(())
    }

    /// Check the commit/status pairing invariant.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(CrankError::CorruptState("task id is required".to_string()));
        }
        if self.title.is_empty() {
            return Err(CrankError::CorruptState(format!(
                "task '{}' has no title",
                self.id
            )));
        }
        match (self.status, &self.commit_sha) {
            (TaskStatus::Completed, None) => Err(CrankError::CorruptState(format!(
                "completed task '{}' has no commit_sha",
                self.id
            ))),
            (TaskStatus::Completed, Some(_)) => Ok(()),
            (_, Some(_)) => Err(CrankError::CorruptState(format!(
                "task '{}' has commit_sha but status {}",
                self.id, self.status
            ))),
            (_, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
    }

    #[test]
    fn test_status_roundtrip() {
        for s in ["pending", "in_progress", "completed", "skipped", "blocked"] {
            let status: TaskStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
    }

    #[test]
    fn test_satisfies_dependency() {
        assert!(TaskStatus::Completed.satisfies_dependency());
        assert!(TaskStatus::Skipped.satisfies_dependency());
        assert!(!TaskStatus::Blocked.satisfies_dependency());
        assert!(!TaskStatus::Pending.satisfies_dependency());
        assert!(!TaskStatus::InProgress.satisfies_dependency());
    }

    #[test]
    fn test_legal_transitions() {
        let mut task = Task::new("1.0", "Build the thing");
        task.transition(TaskStatus::InProgress).unwrap();
        task.transition(TaskStatus::Completed).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn test_illegal_transition() {
        let mut task = Task::new("1.0", "Build the thing");
        let err = task.transition(TaskStatus::Completed).unwrap_err();
        assert!(matches!(err, CrankError::InvalidTransition { .. }));
        // Status untouched after a rejected transition
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_reset_clears_commit_and_iteration() {
        let mut task = Task::new("1.0", "Build the thing");
        task.transition(TaskStatus::InProgress).unwrap();
        task.transition(TaskStatus::Completed).unwrap();
        task.commit_sha = Some("abc123".to_string());
        task.iteration = Some(3);

        task.transition(TaskStatus::Pending).unwrap();
        assert!(task.commit_sha.is_none());
        assert!(task.iteration.is_none());
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_commit_sha_invariant() {
        let mut task = Task::new("1.0", "Build the thing");
        assert!(task.validate().is_ok());

        task.status = TaskStatus::Completed;
        assert!(task.validate().is_err());

        task.commit_sha = Some("abc123".to_string());
        assert!(task.validate().is_ok());

        task.status = TaskStatus::Pending;
        assert!(task.validate().is_err());
    }
}
