use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Output format
    #[arg(short, long, default_value = "human")]
    pub output: crate::cli::output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::Commands;
    use crate::cli::tasks::TasksCommand;

    #[test]
    fn parses_global_flags_and_subcommand() {
        let cli = CliArgs::try_parse_from([
            "promptsmith",
            "-o",
            "json",
            "--log-level",
            "warn",
            "tasks",
            "list",
            "--status",
            "failed",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "warn");
        assert!(!cli.output.is_human());
        match cli.command {
            Commands::Tasks(args) => match args.command {
                TasksCommand::List { status } => assert_eq!(status.as_deref(), Some("failed")),
                _ => panic!("expected list"),
            },
            _ => panic!("expected tasks"),
        }
    }

    #[test]
    fn run_requires_known_stage() {
        assert!(CliArgs::try_parse_from(["promptsmith", "run", "--stage", "all"]).is_ok());
        assert!(CliArgs::try_parse_from(["promptsmith", "run", "--stage", "upscale"]).is_err());
    }
}
