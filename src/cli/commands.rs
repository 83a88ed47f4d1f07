use clap::Subcommand;

use super::history::HistoryArgs;
use super::prefix::PrefixArgs;
use super::run::RunArgs;
use super::serve::ServeArgs;
use super::tasks::TasksArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Add, list, clear, export or import tasks
    Tasks(TasksArgs),

    /// Show or change the prefix prepended to every rewrite request
    Prefix(PrefixArgs),

    /// Show queue sizes and runner counters
    Status,

    /// Drive a stage (or both) against live browser tabs
    Run(RunArgs),

    /// Serve the history API
    Serve(ServeArgs),

    /// Print the latest history records
    History(HistoryArgs),
}
