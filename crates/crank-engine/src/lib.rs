//! The crank iteration engine: pure task selection, quality gating,
//! commit creation, agent invocation, and the controller that sequences
//! one iteration after another.

pub mod agent;
pub mod commit;
pub mod controller;
pub mod gate;
pub mod git;
pub mod scheduler;

pub use agent::{AgentInvoker, AgentOutcome, ProcessAgentInvoker, RepositoryContext};
pub use commit::CommitManager;
pub use controller::{IterationController, RunOutcome, RunReport};
pub use gate::{GateReport, QualityGate};
pub use git::{GitCommand, GitExecutor, GitOutput, MockGitExecutor};
pub use scheduler::{select_next, unresolved, UnresolvedReport};
