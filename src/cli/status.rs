use std::sync::Arc;

use anyhow::Result;
use promptsmith_scheduler::NoopExecutor;

use super::context::CliContext;
use super::output::{emit_structured, OutputFormat};
use crate::controller::{Controller, PipelineStatus, StageStatus};

pub fn cmd_status(ctx: &CliContext, output: &OutputFormat) -> Result<()> {
    let controller = Controller::new(
        ctx.snapshot()?,
        Arc::new(NoopExecutor),
        ctx.activity(),
        ctx.config().runner.clone(),
    );
    let status = controller.status();
    if output.is_human() {
        print_status(&status);
        Ok(())
    } else {
        emit_structured(&status, output)
    }
}

pub(crate) fn print_status(status: &PipelineStatus) {
    let counts = &status.counts;
    println!("Tasks: {}", status.total);
    println!(
        "  pending {}  rewriting {}  rewritten {}  generating {}  completed {}  failed {}",
        counts.pending,
        counts.stage1_in_progress,
        counts.stage1_done,
        counts.stage2_in_progress,
        counts.completed,
        counts.failed
    );
    print_stage("Rewrite", &status.rewrite);
    print_stage("Generate", &status.generate);
}

fn print_stage(label: &str, stage: &StageStatus) {
    println!(
        "{label:<9} queued {:<4} {} (runs {}, ok {}, failed {}, stopped {})",
        stage.queued,
        if stage.running { "running" } else { "idle" },
        stage.runs,
        stage.succeeded,
        stage.failed,
        stage.stopped
    );
}
