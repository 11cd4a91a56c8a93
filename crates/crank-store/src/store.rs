//! Atomic load/save of the versioned task-store document.
//!
//! Writes go to a temp file in the store's directory and are renamed into
//! place, so a crash mid-write never leaves a truncated document. Saves
//! carry an update-timestamp conflict check so concurrent administrative
//! edits are detected instead of silently overwritten.

use chrono::{DateTime, Utc};
use crank_core::{CrankError, Result, StoreDocument};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Handle to the on-disk task store.
pub struct TaskStore {
    path: PathBuf,
    /// `project.updated_at` observed at the last successful load, used to
    /// detect concurrent writers at save time.
    loaded_at: Option<DateTime<Utc>>,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded_at: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a brand-new store. Fails if the file already exists.
    pub async fn init(path: impl Into<PathBuf>, doc: &StoreDocument) -> Result<Self> {
        let path = path.into();
        if fs::try_exists(&path).await? {
            return Err(CrankError::Other(format!(
                "store already exists at {}",
                path.display()
            )));
        }
        doc.validate()?;

        let mut store = Self::new(path);
        store.write_atomic(doc)?;
        store.loaded_at = Some(doc.project.updated_at);
        Ok(store)
    }

    /// Load and validate the document.
    ///
    /// Unparseable JSON or any invariant violation is `CorruptState`
    /// (dependency cycles specifically `DependencyCycle`).
    pub async fn load(&mut self) -> Result<StoreDocument> {
        debug!("Loading task store: {}", self.path.display());

        let data = fs::read(&self.path).await.map_err(|e| {
            CrankError::CorruptState(format!(
                "cannot read store at {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let doc: StoreDocument = serde_json::from_slice(&data)
            .map_err(|e| CrankError::CorruptState(format!("cannot parse store: {}", e)))?;

        doc.validate()?;

        self.loaded_at = Some(doc.project.updated_at);
        Ok(doc)
    }

    /// Persist the document atomically.
    ///
    /// Stamps `project.updated_at`, recomputes the progress summary, and
    /// fails with `ConcurrentWriteConflict` if the on-disk document has
    /// advanced since this handle's last load.
    pub async fn save(&mut self, doc: &mut StoreDocument) -> Result<()> {
        debug!("Saving task store: {}", self.path.display());

        self.check_conflict().await?;

        doc.project.updated_at = Utc::now();
        doc.recompute_progress();
        doc.validate()?;

        self.write_atomic(doc)?;
        self.loaded_at = Some(doc.project.updated_at);
        Ok(())
    }

    async fn check_conflict(&self) -> Result<()> {
        let seen = match self.loaded_at {
            Some(ts) => ts,
            // Never loaded through this handle; nothing to compare.
            None => return Ok(()),
        };

        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if let Ok(on_disk) = serde_json::from_slice::<StoreDocument>(&data) {
            if on_disk.project.updated_at > seen {
                return Err(CrankError::ConcurrentWriteConflict);
            }
        }
        Ok(())
    }

    /// Temp-file-then-rename write in the store's own directory, so the
    /// rename stays on one filesystem.
    fn write_atomic(&self, doc: &StoreDocument) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let data = serde_json::to_vec_pretty(doc)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&data)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| CrankError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crank_core::{ProjectMeta, RunConfig, Task, TaskStatus};
    use tempfile::TempDir;

    fn sample_doc() -> StoreDocument {
        StoreDocument::new(
            ProjectMeta::new("demo"),
            RunConfig::default(),
            vec![
                Task::new("1.0", "First"),
                Task::new("2.0", "Second").with_depends_on(vec!["1.0".into()]),
            ],
        )
    }

    #[tokio::test]
    async fn test_init_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");

        let doc = sample_doc();
        TaskStore::init(&path, &doc).await.unwrap();

        let mut store = TaskStore::new(&path);
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.version, doc.version);
        assert_eq!(loaded.tasks.len(), 2);
        assert_eq!(loaded.tasks[1].depends_on, vec!["1.0".to_string()]);
        assert_eq!(loaded.project.name, "demo");
    }

    #[tokio::test]
    async fn test_init_refuses_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        TaskStore::init(&path, &sample_doc()).await.unwrap();
        assert!(TaskStore::init(&path, &sample_doc()).await.is_err());
    }

    #[tokio::test]
    async fn test_load_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let mut store = TaskStore::new(&path);
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, CrankError::CorruptState(_)));
    }

    #[tokio::test]
    async fn test_load_rejects_cycle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");

        let doc = StoreDocument::new(
            ProjectMeta::new("demo"),
            RunConfig::default(),
            vec![
                Task::new("1.0", "First").with_depends_on(vec!["2.0".into()]),
                Task::new("2.0", "Second").with_depends_on(vec!["1.0".into()]),
            ],
        );
        // Bypass init validation by writing directly.
        tokio::fs::write(&path, serde_json::to_vec_pretty(&doc).unwrap())
            .await
            .unwrap();

        let mut store = TaskStore::new(&path);
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, CrankError::DependencyCycle(_)));
    }

    #[tokio::test]
    async fn test_save_then_load_preserves_status() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        TaskStore::init(&path, &sample_doc()).await.unwrap();

        let mut store = TaskStore::new(&path);
        let mut doc = store.load().await.unwrap();
        doc.task_mut("1.0")
            .unwrap()
            .transition(TaskStatus::InProgress)
            .unwrap();
        store.save(&mut doc).await.unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded.task("1.0").unwrap().status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_concurrent_write_conflict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        TaskStore::init(&path, &sample_doc()).await.unwrap();

        let mut ours = TaskStore::new(&path);
        let mut our_doc = ours.load().await.unwrap();

        // Another handle saves in between.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let mut theirs = TaskStore::new(&path);
        let mut their_doc = theirs.load().await.unwrap();
        theirs.save(&mut their_doc).await.unwrap();

        let err = ours.save(&mut our_doc).await.unwrap_err();
        assert!(matches!(err, CrankError::ConcurrentWriteConflict));
    }

    #[tokio::test]
    async fn test_save_recomputes_progress() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        TaskStore::init(&path, &sample_doc()).await.unwrap();

        let mut store = TaskStore::new(&path);
        let mut doc = store.load().await.unwrap();
        {
            let task = doc.task_mut("1.0").unwrap();
            task.transition(TaskStatus::InProgress).unwrap();
            task.transition(TaskStatus::Completed).unwrap();
            task.commit_sha = Some("abc123".into());
        }
        store.save(&mut doc).await.unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded.progress.completed_tasks, 1);
        assert_eq!(reloaded.progress.total_tasks, 2);
    }
}
