//! Persistence layer for crank: the task store document, the append-only
//! progress journal, and the run lock.

pub mod lock;
pub mod progress_log;
pub mod store;

pub use lock::RunLock;
pub use progress_log::ProgressLog;
pub use store::TaskStore;
