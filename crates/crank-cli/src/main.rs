//! crank CLI - autonomous iteration engine over a task graph
//!
//! Usage:
//!   crank init --name <project> [--prd <file>] [--tasks <file>]
//!   crank run [-n <iterations>]
//!   crank status                Show counts by status
//!   crank list                  List all tasks
//!   crank add <id> <title>      Add a pending task
//!   crank complete <id> <sha>   Administratively complete a task
//!   crank skip <id>             Skip a task (satisfies dependents)
//!   crank reset <id>            Reset a task to pending

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crank_core::{
    Complexity, Priority, ProjectMeta, RunConfig, StoreDocument, Task, TaskStatus,
};
use crank_engine::{
    CommitManager, GitCommand, IterationController, ProcessAgentInvoker, QualityGate,
    RepositoryContext, RunOutcome,
};
use crank_store::{ProgressLog, RunLock, TaskStore};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const CRANK_DIR: &str = ".crank";
const STORE_FILE: &str = "tasks.json";
const PROGRESS_FILE: &str = "progress.log";

#[derive(Parser)]
#[command(name = "crank")]
#[command(author, version, about = "Autonomous iteration engine over a task graph")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Working tree root (defaults to current directory)
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a task store
    Init {
        /// Project name
        #[arg(long)]
        name: String,

        /// Project description
        #[arg(long, default_value = "")]
        description: String,

        /// Requirements document the tasks were derived from
        #[arg(long)]
        prd: Option<PathBuf>,

        /// JSON file with an initial task list (array of tasks)
        #[arg(long)]
        tasks: Option<PathBuf>,
    },

    /// Start or resume a run
    Run {
        /// Maximum iterations (defaults to the configured cap)
        #[arg(short = 'n', long)]
        iterations: Option<u32>,
    },

    /// Show task counts and overall progress
    Status,

    /// List all tasks
    List,

    /// Add a pending task
    Add {
        id: String,
        title: String,

        #[arg(long, default_value = "medium")]
        priority: Priority,

        #[arg(long, default_value = "medium")]
        complexity: Complexity,

        /// Dependency task ids (repeatable)
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
    },

    /// Administratively mark a task completed
    Complete {
        id: String,
        /// Revision id to record
        commit_sha: String,
    },

    /// Skip a task; skipped tasks satisfy their dependents
    Skip { id: String },

    /// Reset a task to pending, clearing its commit and iteration
    Reset { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let crank_dir = cli.workdir.join(CRANK_DIR);
    let store_path = crank_dir.join(STORE_FILE);
    let progress_path = crank_dir.join(PROGRESS_FILE);

    match cli.command {
        Commands::Init {
            name,
            description,
            prd,
            tasks,
        } => cmd_init(store_path, name, description, prd, tasks).await,
        Commands::Run { iterations } => {
            cmd_run(cli.workdir, crank_dir, store_path, progress_path, iterations).await
        }
        Commands::Status => cmd_status(store_path).await,
        Commands::List => cmd_list(store_path).await,
        Commands::Add {
            id,
            title,
            priority,
            complexity,
            depends_on,
        } => cmd_add(store_path, id, title, priority, complexity, depends_on).await,
        Commands::Complete { id, commit_sha } => {
            cmd_transition(store_path, id, TaskStatus::Completed, Some(commit_sha)).await
        }
        Commands::Skip { id } => cmd_transition(store_path, id, TaskStatus::Skipped, None).await,
        Commands::Reset { id } => cmd_transition(store_path, id, TaskStatus::Pending, None).await,
    }
}

async fn cmd_init(
    store_path: PathBuf,
    name: String,
    description: String,
    prd: Option<PathBuf>,
    tasks_file: Option<PathBuf>,
) -> Result<()> {
    let mut project = ProjectMeta::new(name);
    project.description = description;
    if let Some(prd) = &prd {
        project.source_prd = prd.display().to_string();
    }

    let tasks: Vec<Task> = match tasks_file {
        Some(path) => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading task list {}", path.display()))?;
            serde_json::from_slice(&data)
                .with_context(|| format!("parsing task list {}", path.display()))?
        }
        None => Vec::new(),
    };

    let doc = StoreDocument::new(project, RunConfig::default(), tasks);
    if let Some(parent) = store_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    TaskStore::init(&store_path, &doc).await?;
    info!(
        "Initialized store at {} with {} tasks",
        store_path.display(),
        doc.tasks.len()
    );
    Ok(())
}

async fn cmd_run(
    workdir: PathBuf,
    crank_dir: PathBuf,
    store_path: PathBuf,
    progress_path: PathBuf,
    iterations: Option<u32>,
) -> Result<()> {
    // Held for the whole run; a second invocation fails fast.
    let _lock = RunLock::acquire(&crank_dir)?;

    let mut store = TaskStore::new(&store_path);
    let doc = store.load().await?;

    let preamble = match &doc.config.ai_prompt_file {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading prompt file {}", path))?,
        ),
        None => None,
    };

    // Anchor everything at the enclosing repository root rather than
    // wherever --workdir happened to point.
    let git = GitCommand::detect_in(&workdir).await?;
    let root = git.root().to_path_buf();
    info!("Repository root: {}", root.display());

    let mut controller = IterationController::new(
        store,
        ProgressLog::new(&progress_path),
        QualityGate::new(&root),
        CommitManager::new(git),
        ProcessAgentInvoker::new(&doc.config.ai_tool),
        RepositoryContext {
            workdir: root,
            prompt_preamble: preamble,
        },
    );

    let report = controller.run(iterations).await?;

    println!(
        "Run finished: {} iterations, {} tasks completed",
        report.iterations_run, report.tasks_completed
    );
    match report.outcome {
        RunOutcome::AllDone => {
            println!("All resolvable work done.");
            Ok(())
        }
        RunOutcome::Partial => {
            if !report.leftover.blocked.is_empty() {
                println!("Blocked: {}", report.leftover.blocked.join(", "));
            }
            if !report.leftover.unsatisfiable.is_empty() {
                println!(
                    "Unsatisfiable dependencies: {}",
                    report.leftover.unsatisfiable.join(", ")
                );
            }
            if !report.leftover.stalled.is_empty() {
                println!(
                    "Stalled in_progress (reset or block to retry): {}",
                    report.leftover.stalled.join(", ")
                );
            }
            std::process::exit(2);
        }
        RunOutcome::IterationCapReached => {
            println!("Iteration cap reached with work remaining.");
            Ok(())
        }
    }
}

async fn cmd_status(store_path: PathBuf) -> Result<()> {
    let mut store = TaskStore::new(&store_path);
    let doc = store.load().await?;

    let count = |s: TaskStatus| doc.tasks.iter().filter(|t| t.status == s).count();
    println!("Project: {}", doc.project.name);
    println!(
        "Progress: {}/{} completed ({})",
        doc.progress.completed_tasks, doc.progress.total_tasks, doc.progress.status
    );
    println!("  pending:     {}", count(TaskStatus::Pending));
    println!("  in_progress: {}", count(TaskStatus::InProgress));
    println!("  completed:   {}", count(TaskStatus::Completed));
    println!("  skipped:     {}", count(TaskStatus::Skipped));
    println!("  blocked:     {}", count(TaskStatus::Blocked));
    Ok(())
}

async fn cmd_list(store_path: PathBuf) -> Result<()> {
    let mut store = TaskStore::new(&store_path);
    let doc = store.load().await?;

    for task in &doc.tasks {
        let deps = if task.depends_on.is_empty() {
            String::new()
        } else {
            format!(" (after {})", task.depends_on.join(", "))
        };
        let sha = task
            .commit_sha
            .as_deref()
            .map(|s| format!(" [{}]", short_sha(s)))
            .unwrap_or_default();
        println!(
            "{:12} {:10} {:8} {}{}{}",
            task.id, task.status, task.priority, task.title, deps, sha
        );
    }
    Ok(())
}

/// Abbreviate a revision id for display. Falls back to the full string
/// when the 8-byte cut would split a character.
fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}

async fn cmd_add(
    store_path: PathBuf,
    id: String,
    title: String,
    priority: Priority,
    complexity: Complexity,
    depends_on: Vec<String>,
) -> Result<()> {
    let mut store = TaskStore::new(&store_path);
    let mut doc = store.load().await?;

    let mut task = Task::new(&id, title).with_priority(priority);
    task.complexity = complexity;
    task.depends_on = depends_on;
    doc.tasks.push(task);

    // validate() inside save rejects duplicate ids and cycles.
    store.save(&mut doc).await?;
    info!("Added task {}", id);
    Ok(())
}

async fn cmd_transition(
    store_path: PathBuf,
    id: String,
    to: TaskStatus,
    commit_sha: Option<String>,
) -> Result<()> {
    let mut store = TaskStore::new(&store_path);
    let mut doc = store.load().await?;

    {
        let task = doc.task_mut(&id)?;
        // Administrative complete/skip of a pending task passes through
        // in_progress so the transition table stays authoritative.
        if task.status == TaskStatus::Pending && to != TaskStatus::Pending {
            task.transition(TaskStatus::InProgress)?;
        }
        task.transition(to)?;
        if to == TaskStatus::Completed {
            task.commit_sha = commit_sha;
        }
    }

    store.save(&mut doc).await?;
    info!("Task {} is now {}", id, to);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_sha_truncates_plain_hex() {
        assert_eq!(short_sha("deadbeef123456"), "deadbeef");
        assert_eq!(short_sha("abc"), "abc");
    }

    #[test]
    fn test_short_sha_survives_multibyte_input() {
        // Administratively recorded ids are free text; a cut that would
        // split a character keeps the whole string instead of panicking.
        // "α" is two bytes, so byte 8 here lands mid-character.
        assert_eq!(short_sha("abcdefgα-rest"), "abcdefgα-rest");
        // When the cut falls on a boundary the prefix is kept as usual.
        assert_eq!(short_sha("αααα-tail"), "αααα");
    }
}
