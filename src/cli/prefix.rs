use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use super::context::CliContext;
use super::output::{emit_structured, OutputFormat};
use super::tasks::ensure_persisted;

#[derive(Args, Clone)]
pub struct PrefixArgs {
    #[command(subcommand)]
    pub command: PrefixCommand,
}

#[derive(Subcommand, Clone)]
pub enum PrefixCommand {
    /// Print the saved prefix
    Show,
    /// Save a new prefix (an empty string sends task text unchanged)
    Set {
        /// Prefix text
        text: String,
    },
}

pub fn cmd_prefix(args: PrefixArgs, ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    match args.command {
        PrefixCommand::Show => {
            let prefix = ctx.snapshot()?.prefix();
            if output.is_human() {
                if prefix.trim().is_empty() {
                    println!("(no prefix)");
                } else {
                    println!("{prefix}");
                }
            } else {
                emit_structured(&json!({ "prefix": prefix }), output)?;
            }
        }
        PrefixCommand::Set { text } => {
            let store = ctx.store()?;
            let mut events = store.subscribe();
            store.set_prefix(text);
            ensure_persisted(&mut events)?;
            println!("Prefix saved");
        }
    }
    Ok(())
}
