//! Progress journal entry types and line format.
//!
//! One entry per line:
//! `[<rfc3339 timestamp>] [iteration:<n>] [task:<id>]? <KIND>: <free text>`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of progress entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Started,
    Completed,
    Error,
    Learning,
    QualityCheck,
    Commit,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "STARTED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Error => write!(f, "ERROR"),
            Self::Learning => write!(f, "LEARNING"),
            Self::QualityCheck => write!(f, "QUALITY_CHECK"),
            Self::Commit => write!(f, "COMMIT"),
        }
    }
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "STARTED" => Ok(Self::Started),
            "COMPLETED" => Ok(Self::Completed),
            "ERROR" => Ok(Self::Error),
            "LEARNING" => Ok(Self::Learning),
            "QUALITY_CHECK" => Ok(Self::QualityCheck),
            "COMMIT" => Ok(Self::Commit),
            _ => Err(format!("Invalid entry kind: {}", s)),
        }
    }
}

/// An immutable journal entry. The log is append-only and ordered by
/// write time; entries are never edited or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub timestamp: DateTime<Utc>,
    pub iteration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub kind: EntryKind,
    pub message: String,
}

impl ProgressEntry {
    pub fn new(iteration: u32, kind: EntryKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            iteration,
            task_id: None,
            kind,
            message: message.into(),
        }
    }

    pub fn for_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Render as a single journal line (no trailing newline). Embedded
    /// newlines in the message are flattened so one entry stays one line.
    pub fn to_line(&self) -> String {
        let message = self.message.replace('\n', " ");
        match &self.task_id {
            Some(id) => format!(
                "[{}] [iteration:{}] [task:{}] {}: {}",
                self.timestamp.to_rfc3339(),
                self.iteration,
                id,
                self.kind,
                message
            ),
            None => format!(
                "[{}] [iteration:{}] {}: {}",
                self.timestamp.to_rfc3339(),
                self.iteration,
                self.kind,
                message
            ),
        }
    }

    /// Parse a journal line produced by [`to_line`](Self::to_line).
    pub fn parse_line(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let (ts, rest) = rest.split_once("] ")?;
        let timestamp = DateTime::parse_from_rfc3339(ts).ok()?.with_timezone(&Utc);

        let rest = rest.strip_prefix("[iteration:")?;
        let (iter, rest) = rest.split_once("] ")?;
        let iteration: u32 = iter.parse().ok()?;

        let (task_id, rest) = if let Some(r) = rest.strip_prefix("[task:") {
            let (id, r) = r.split_once("] ")?;
            (Some(id.to_string()), r)
        } else {
            (None, rest)
        };

        let (kind, message) = rest.split_once(": ")?;
        let kind: EntryKind = kind.parse().ok()?;

        Some(Self {
            timestamp,
            iteration,
            task_id,
            kind,
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_roundtrip_with_task() {
        let entry = ProgressEntry::new(3, EntryKind::Commit, "committed abc123").for_task("1.0");
        let line = entry.to_line();
        assert!(line.contains("[iteration:3]"));
        assert!(line.contains("[task:1.0]"));
        assert!(line.contains("COMMIT: committed abc123"));

        let parsed = ProgressEntry::parse_line(&line).unwrap();
        assert_eq!(parsed.iteration, 3);
        assert_eq!(parsed.task_id.as_deref(), Some("1.0"));
        assert_eq!(parsed.kind, EntryKind::Commit);
        assert_eq!(parsed.message, "committed abc123");
    }

    #[test]
    fn test_line_roundtrip_without_task() {
        let entry = ProgressEntry::new(1, EntryKind::Learning, "no eligible tasks");
        let parsed = ProgressEntry::parse_line(&entry.to_line()).unwrap();
        assert!(parsed.task_id.is_none());
        assert_eq!(parsed.kind, EntryKind::Learning);
    }

    #[test]
    fn test_multiline_message_flattened() {
        let entry = ProgressEntry::new(2, EntryKind::Error, "line one\nline two");
        let line = entry.to_line();
        assert!(!line.contains('\n'));
        let parsed = ProgressEntry::parse_line(&line).unwrap();
        assert_eq!(parsed.message, "line one line two");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ProgressEntry::parse_line("not a journal line").is_none());
        assert!(ProgressEntry::parse_line("").is_none());
    }

    #[test]
    fn test_kind_roundtrip() {
        for k in ["STARTED", "COMPLETED", "ERROR", "LEARNING", "QUALITY_CHECK", "COMMIT"] {
            let kind: EntryKind = k.parse().unwrap();
            assert_eq!(kind.to_string(), k);
        }
    }
}
