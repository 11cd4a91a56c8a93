//! Append-only progress journal.
//!
//! Each append opens the file in append mode and writes exactly one
//! complete line, so concurrent readers never observe a partial entry.
//! There is no delete or update operation.

use crank_core::{ProgressEntry, Result};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Writer/reader for the progress journal file.
pub struct ProgressLog {
    path: PathBuf,
}

impl ProgressLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single line.
    pub async fn append(&self, entry: &ProgressEntry) -> Result<()> {
        debug!("Appending {} entry to {}", entry.kind, self.path.display());

        let mut line = entry.to_line();
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read the whole journal back. Lines that do not parse are skipped;
    /// the journal may legitimately contain hand-written operator notes.
    pub async fn read_all(&self) -> Result<Vec<ProgressEntry>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .filter_map(ProgressEntry::parse_line)
            .collect())
    }
}
