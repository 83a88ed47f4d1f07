use super::env::CliArgs;
use super::history::cmd_history;
use super::prefix::cmd_prefix;
use super::run::cmd_run;
use super::serve::cmd_serve;
use super::status::cmd_status;
use super::tasks::cmd_tasks;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Tasks(args) => cmd_tasks(args, ctx, &cli.output).await,
        Commands::Prefix(args) => cmd_prefix(args, ctx, &cli.output),
        Commands::Status => cmd_status(ctx, &cli.output),
        Commands::Run(args) => cmd_run(args, ctx, &cli.output).await,
        Commands::Serve(args) => cmd_serve(args, ctx).await,
        Commands::History(args) => cmd_history(args, ctx, &cli.output).await,
    }
}
