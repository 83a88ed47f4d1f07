use anyhow::{Context, Result};
use clap::Args;

use super::context::CliContext;
use super::output::{emit_structured, OutputFormat};
use crate::history::{HistoryClient, HistoryRecord};

#[derive(Args, Clone)]
pub struct HistoryArgs {
    /// History service base URL (defaults to history.base_url)
    #[arg(long)]
    pub url: Option<String>,
}

pub async fn cmd_history(args: HistoryArgs, ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    let config = &ctx.config().history;
    let base_url = args.url.unwrap_or_else(|| config.base_url.clone());
    let client = HistoryClient::new(&base_url, config.timeout())?;
    let records = client
        .latest()
        .await
        .with_context(|| format!("failed to fetch history from {}", client.tasks_url()))?;

    if output.is_human() {
        print_history(&records);
        Ok(())
    } else {
        emit_structured(&records, output)
    }
}

fn print_history(records: &[HistoryRecord]) {
    if records.is_empty() {
        println!("No history records");
        return;
    }
    for record in records {
        println!(
            "{}  {:<18} {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.status,
            record.original_text.replace('\n', " ")
        );
        if let Some(prompt) = &record.stage1_result {
            println!("    prompt: {}", prompt.replace('\n', " "));
        }
        if let Some(image) = &record.stage2_result {
            println!("    image:  {image}");
        }
    }
}
