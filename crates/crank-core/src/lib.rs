//! Core types for the crank iteration engine.
//!
//! This crate defines the task graph data model, the persisted store
//! document schema, and the unified error type shared by the storage
//! and engine crates.

pub mod error;
pub mod progress;
pub mod schema;
pub mod types;

pub use error::{CrankError, Result};
pub use progress::{EntryKind, ProgressEntry};
pub use schema::{ProgressSummary, ProjectMeta, ProjectStatus, RunConfig, StoreDocument};
pub use types::{Complexity, Priority, Task, TaskStatus};
