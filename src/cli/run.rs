use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use context_bridge::ExecutionBridge;
use promptsmith_core_types::{SiteId, Stage};
use promptsmith_scheduler::{NoopSink, ResultSink, RunOutcome, RunReport};
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use super::context::CliContext;
use super::output::{emit_structured, OutputFormat};
use super::status::print_status;
use crate::browser::{report_contexts, LiveContexts};
use crate::controller::Controller;
use crate::history::HistoryClient;

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Which stage to run
    #[arg(long, value_enum, default_value_t = StageArg::All)]
    pub stage: StageArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StageArg {
    Rewrite,
    Generate,
    All,
}

/// What a Ctrl-C means at this point of the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Interrupt {
    /// Let the task in flight finish, then stop.
    Stop,
    /// Abandon the task in flight and exit.
    Abort,
}

#[derive(Default)]
struct Interrupts {
    seen: u32,
}

impl Interrupts {
    fn next(&mut self) -> Interrupt {
        self.seen += 1;
        if self.seen == 1 {
            Interrupt::Stop
        } else {
            Interrupt::Abort
        }
    }
}

impl StageArg {
    fn sites(self) -> Vec<SiteId> {
        match self {
            StageArg::Rewrite => vec![SiteId::Assistant],
            StageArg::Generate => vec![SiteId::Generator],
            StageArg::All => SiteId::ALL.to_vec(),
        }
    }
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    let config = ctx.config();
    let store = ctx.store()?;
    let activity = ctx.activity();
    let mut lines = activity.subscribe();
    let echo = output.is_human();

    let (events, _) = broadcast::channel(64);
    let bridge = ExecutionBridge::with_deadline(events, config.bridge.channel_timeout());
    let reporter = report_contexts(&bridge, Arc::clone(&activity));
    let live = LiveContexts::open(config, Arc::clone(&bridge), &args.stage.sites()).await?;
    info!(sites = ?live.sites(), "execution contexts ready");

    let sink: Arc<dyn ResultSink> = if config.history.enabled {
        let client = HistoryClient::new(&config.history.base_url, config.history.timeout())
            .context("failed to build history client")?;
        info!(url = %client.tasks_url(), "recording results to history");
        Arc::new(client)
    } else {
        Arc::new(NoopSink)
    };

    let controller = Controller::with_sink(
        store,
        bridge,
        Arc::clone(&activity),
        config.runner.clone(),
        sink,
    );
    let store_watch = controller.watch_store();

    let run = async {
        match args.stage {
            StageArg::All => controller.run_all().await,
            StageArg::Rewrite => controller.run(Stage::Rewrite).await.map(|r| vec![r]),
            StageArg::Generate => controller.run(Stage::Generate).await.map(|r| vec![r]),
        }
    };
    tokio::pin!(run);

    let mut interrupts = Interrupts::default();
    let mut signals_ok = true;
    let result = loop {
        tokio::select! {
            result = &mut run => break Some(result),
            line = lines.recv() => match line {
                Ok(line) if echo => println!("{line}"),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "activity output lagged"),
                Err(RecvError::Closed) => {}
            },
            signal = tokio::signal::ctrl_c(), if signals_ok => {
                if let Err(err) = signal {
                    warn!(%err, "failed to listen for Ctrl-C");
                    signals_ok = false;
                    continue;
                }
                match interrupts.next() {
                    Interrupt::Stop => {
                        if controller.stop_all() {
                            println!("Stop requested; finishing the current task (Ctrl-C again to abort)");
                        }
                    }
                    Interrupt::Abort => {
                        activity.warn("aborted; the task in flight was abandoned");
                        break None;
                    }
                }
            }
        }
    };
    while let Ok(line) = lines.try_recv() {
        if echo {
            println!("{line}");
        }
    }

    store_watch.abort();
    reporter.abort();
    if let Err(err) = live.close().await {
        warn!(%err, "browser did not shut down cleanly");
    }

    let Some(result) = result else {
        bail!("run aborted by a second interrupt");
    };
    let reports = result?;
    if echo {
        for report in &reports {
            println!("{}", summarize(report));
        }
        print_status(&controller.status());
    } else {
        let body: Vec<Value> = reports.iter().map(report_json).collect();
        emit_structured(&body, output)?;
    }
    Ok(())
}

fn outcome_label(outcome: RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Completed => "completed",
        RunOutcome::Stopped => "stopped",
        RunOutcome::Unavailable => "unavailable",
    }
}

fn summarize(report: &RunReport) -> String {
    format!(
        "{} {}: {}/{} processed, {} succeeded, {} failed",
        report.stage,
        outcome_label(report.outcome),
        report.processed,
        report.queued,
        report.succeeded,
        report.failed
    )
}

fn report_json(report: &RunReport) -> Value {
    json!({
        "stage": report.stage,
        "outcome": outcome_label(report.outcome),
        "queued": report.queued,
        "processed": report.processed,
        "succeeded": report.succeeded,
        "failed": report.failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_interrupt_aborts() {
        let mut interrupts = Interrupts::default();
        assert_eq!(interrupts.next(), Interrupt::Stop);
        assert_eq!(interrupts.next(), Interrupt::Abort);
        assert_eq!(interrupts.next(), Interrupt::Abort);
    }

    #[test]
    fn stage_selects_sites() {
        assert_eq!(StageArg::Rewrite.sites(), vec![SiteId::Assistant]);
        assert_eq!(StageArg::Generate.sites(), vec![SiteId::Generator]);
        assert_eq!(StageArg::All.sites().len(), 2);
    }
}
