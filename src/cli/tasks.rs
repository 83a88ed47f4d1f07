use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Subcommand};
use promptsmith_core_types::{Task, TaskStatus};
use promptsmith_task_store::{export_file_name, StoreEvent};
use tokio::fs;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::info;

use super::context::CliContext;
use super::output::{emit_structured, OutputFormat};

const PREVIEW_CHARS: usize = 48;

#[derive(Args, Clone)]
pub struct TasksArgs {
    #[command(subcommand)]
    pub command: TasksCommand,
}

#[derive(Subcommand, Clone)]
pub enum TasksCommand {
    /// Append one pending task per non-empty line (stdin when neither flag is given)
    Add {
        /// Read lines from a file
        #[arg(long, value_name = "FILE", conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Use the given text
        #[arg(long)]
        text: Option<String>,
    },
    /// List tasks in insertion order
    List {
        /// Only show tasks with this status
        #[arg(long)]
        status: Option<String>,
    },
    /// Remove every task
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Write all tasks to a JSON file
    Export {
        /// Destination (defaults to tasks_<date>.json)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Replace all tasks with the contents of an exported JSON file
    Import {
        /// Exported JSON file
        file: PathBuf,
    },
}

pub async fn cmd_tasks(args: TasksArgs, ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    match args.command {
        TasksCommand::Add { file, text } => {
            let raw = match (file, text) {
                (Some(path), _) => fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, Some(text)) => text,
                (None, None) => {
                    let mut raw = String::new();
                    io::stdin()
                        .read_to_string(&mut raw)
                        .context("failed to read tasks from stdin")?;
                    raw
                }
            };
            let store = ctx.store()?;
            let mut events = store.subscribe();
            let added = store.parse(&raw)?;
            ensure_persisted(&mut events)?;
            if output.is_human() {
                println!("Added {} task(s); {} in total", added.len(), store.len());
            } else {
                emit_structured(&added, output)?;
            }
        }
        TasksCommand::List { status } => {
            let store = ctx.snapshot()?;
            let filter = status
                .as_deref()
                .map(str::parse::<TaskStatus>)
                .transpose()?;
            let tasks = match filter {
                Some(status) => store.filter(|task| task.status == status),
                None => store.all(),
            };
            if output.is_human() {
                print_task_table(&tasks);
            } else {
                emit_structured(&tasks, output)?;
            }
        }
        TasksCommand::Clear { yes } => {
            let store = ctx.store()?;
            let mut events = store.subscribe();
            let count = store.len();
            if count == 0 {
                println!("No tasks to clear");
                return Ok(());
            }
            if !yes && !confirm(&format!("Remove all {count} task(s)?"))? {
                println!("Aborted");
                return Ok(());
            }
            let removed = store.clear();
            ensure_persisted(&mut events)?;
            info!(removed, "cleared tasks");
            println!("Removed {removed} task(s)");
        }
        TasksCommand::Export { out } => {
            let store = ctx.snapshot()?;
            let path =
                out.unwrap_or_else(|| PathBuf::from(export_file_name(Local::now().date_naive())));
            let json = store.export_json()?;
            fs::write(&path, json)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported {} task(s) to {}", store.len(), path.display());
        }
        TasksCommand::Import { file } => {
            let raw = fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let store = ctx.store()?;
            let mut events = store.subscribe();
            let count = store
                .import_json(&raw)
                .with_context(|| format!("import of {} rejected", file.display()))?;
            ensure_persisted(&mut events)?;
            println!("Imported {count} task(s) from {}", file.display());
        }
    }
    Ok(())
}

/// Fails when the store reported a persistence failure since `events` was subscribed.
pub(crate) fn ensure_persisted(events: &mut broadcast::Receiver<StoreEvent>) -> Result<()> {
    loop {
        match events.try_recv() {
            Ok(StoreEvent::PersistFailed { error }) => bail!("failed to save tasks: {error}"),
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(()),
        }
    }
}

fn print_task_table(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks");
        return;
    }
    println!("{:<38} {:<20} {}", "TASK ID", "STATUS", "TEXT");
    for task in tasks {
        println!(
            "{:<38} {:<20} {}",
            task.id,
            task.status,
            preview(&task.original_text)
        );
        if !task.error.is_empty() {
            println!("{:<38} {:<20} error: {}", "", "", task.error);
        }
    }
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
