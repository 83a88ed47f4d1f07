use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

use promptsmith_core_types::Stage;

#[derive(Default)]
struct Counters {
    runs: AtomicU64,
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    stopped: AtomicU64,
}

static REWRITE: Lazy<Counters> = Lazy::new(Counters::default);
static GENERATE: Lazy<Counters> = Lazy::new(Counters::default);

fn counters(stage: Stage) -> &'static Counters {
    match stage {
        Stage::Rewrite => &REWRITE,
        Stage::Generate => &GENERATE,
    }
}

fn increment(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn record_run(stage: Stage) {
    increment(&counters(stage).runs);
}

pub fn record_started(stage: Stage) {
    increment(&counters(stage).started);
}

pub fn record_succeeded(stage: Stage) {
    increment(&counters(stage).succeeded);
}

pub fn record_failed(stage: Stage) {
    increment(&counters(stage).failed);
}

pub fn record_stopped(stage: Stage) {
    increment(&counters(stage).stopped);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageMetricsSnapshot {
    pub runs: u64,
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub stopped: u64,
}

pub fn snapshot(stage: Stage) -> StageMetricsSnapshot {
    let counters = counters(stage);
    StageMetricsSnapshot {
        runs: counters.runs.load(Ordering::Relaxed),
        started: counters.started.load(Ordering::Relaxed),
        succeeded: counters.succeeded.load(Ordering::Relaxed),
        failed: counters.failed.load(Ordering::Relaxed),
        stopped: counters.stopped.load(Ordering::Relaxed),
    }
}
