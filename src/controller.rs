//! Controller: owns the task store, the activity log and one batch runner per stage.
//!
//! Both runners share the store and the executor but never run the same stage twice at once;
//! a rewrite run and a generate run may overlap, each working its own queue.

use std::sync::Arc;

use promptsmith_core_types::{Stage, StatusCounts};
use promptsmith_event_bus::ActivityLog;
use promptsmith_scheduler::metrics::{self, StageMetricsSnapshot};
use promptsmith_scheduler::{
    BatchRunner, NoopSink, ResultSink, RunConfig, RunOutcome, RunReport, RunState,
    SchedulerError, StageExecutor,
};
use promptsmith_task_store::{StoreEvent, TaskStore};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::RunnerConfig;

pub struct Controller<E>
where
    E: StageExecutor + 'static,
{
    store: Arc<TaskStore>,
    activity: Arc<ActivityLog>,
    rewrite: Arc<BatchRunner<E>>,
    generate: Arc<BatchRunner<E>>,
    delays: RunnerConfig,
}

/// Snapshot shown by `status`.
#[derive(Clone, Debug, Serialize)]
pub struct PipelineStatus {
    pub prefix: String,
    pub total: usize,
    pub counts: StatusCounts,
    pub rewrite: StageStatus,
    pub generate: StageStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct StageStatus {
    pub queued: usize,
    pub running: bool,
    pub runs: u64,
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub stopped: u64,
}

impl StageStatus {
    fn new(queued: usize, state: RunState, metrics: StageMetricsSnapshot) -> Self {
        Self {
            queued,
            running: state == RunState::Running,
            runs: metrics.runs,
            started: metrics.started,
            succeeded: metrics.succeeded,
            failed: metrics.failed,
            stopped: metrics.stopped,
        }
    }
}

impl<E> Controller<E>
where
    E: StageExecutor + 'static,
{
    pub fn new(
        store: Arc<TaskStore>,
        executor: Arc<E>,
        activity: Arc<ActivityLog>,
        delays: RunnerConfig,
    ) -> Self {
        Self::with_sink(store, executor, activity, delays, Arc::new(NoopSink))
    }

    /// Like [`Controller::new`], with finished generate results handed to `sink`.
    pub fn with_sink(
        store: Arc<TaskStore>,
        executor: Arc<E>,
        activity: Arc<ActivityLog>,
        delays: RunnerConfig,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        let rewrite = BatchRunner::new(
            Stage::Rewrite,
            Arc::clone(&store),
            Arc::clone(&executor),
            Arc::clone(&activity),
        );
        let generate = BatchRunner::new(
            Stage::Generate,
            Arc::clone(&store),
            executor,
            Arc::clone(&activity),
        )
        .with_sink(sink);
        Self {
            store,
            activity,
            rewrite: Arc::new(rewrite),
            generate: Arc::new(generate),
            delays,
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn activity(&self) -> &Arc<ActivityLog> {
        &self.activity
    }

    pub fn runner(&self, stage: Stage) -> &Arc<BatchRunner<E>> {
        match stage {
            Stage::Rewrite => &self.rewrite,
            Stage::Generate => &self.generate,
        }
    }

    /// Run parameters for `stage`, with the prefix as currently saved.
    pub fn run_config(&self, stage: Stage) -> RunConfig {
        RunConfig::for_stage(stage, self.store.prefix()).with_delay(self.delays.delay_for(stage))
    }

    pub async fn run(&self, stage: Stage) -> Result<RunReport, SchedulerError> {
        self.runner(stage).start(self.run_config(stage)).await
    }

    /// Starts `stage` in the background.
    pub fn start(&self, stage: Stage) -> JoinHandle<Result<RunReport, SchedulerError>> {
        let runner = Arc::clone(self.runner(stage));
        let config = self.run_config(stage);
        tokio::spawn(async move { runner.start(config).await })
    }

    /// Rewrite then generate. A stopped or unavailable rewrite run ends the sequence.
    pub async fn run_all(&self) -> Result<Vec<RunReport>, SchedulerError> {
        let rewrite = self.run(Stage::Rewrite).await?;
        if rewrite.outcome != RunOutcome::Completed {
            return Ok(vec![rewrite]);
        }
        let generate = self.run(Stage::Generate).await?;
        Ok(vec![rewrite, generate])
    }

    pub fn stop(&self, stage: Stage) -> bool {
        self.runner(stage).stop()
    }

    /// Requests a stop on every running stage. Returns whether any run was signalled.
    pub fn stop_all(&self) -> bool {
        let rewrite = self.rewrite.stop();
        let generate = self.generate.stop();
        rewrite || generate
    }

    pub fn status(&self) -> PipelineStatus {
        let counts = self.store.counts();
        PipelineStatus {
            prefix: self.store.prefix(),
            total: counts.total(),
            counts,
            rewrite: StageStatus::new(
                counts.queued_for(Stage::Rewrite),
                self.rewrite.state(),
                metrics::snapshot(Stage::Rewrite),
            ),
            generate: StageStatus::new(
                counts.queued_for(Stage::Generate),
                self.generate.state(),
                metrics::snapshot(Stage::Generate),
            ),
        }
    }

    /// Surfaces store persistence failures in the activity log until the store goes away.
    pub fn watch_store(&self) -> JoinHandle<()> {
        let mut events = self.store.subscribe();
        let activity = Arc::clone(&self.activity);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(StoreEvent::PersistFailed { error }) => {
                        activity.error(format!("failed to save tasks: {error}"));
                    }
                    Ok(event) => debug!(?event, "store changed"),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "store watcher lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptsmith_core_types::TaskStatus;
    use promptsmith_scheduler::NoopExecutor;

    fn quick() -> RunnerConfig {
        RunnerConfig {
            rewrite_delay_ms: 10,
            generate_delay_ms: 10,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_all_moves_tasks_through_both_stages() {
        let store = TaskStore::in_memory();
        store.set_prefix("P:");
        store.parse("one\ntwo").unwrap();
        let controller =
            Controller::new(store.clone(), Arc::new(NoopExecutor), ActivityLog::new(32), quick());

        let reports = controller.run_all().await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.outcome == RunOutcome::Completed));

        let tasks = store.all();
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));
        assert_eq!(tasks[0].stage1_result, "P:\none");
        assert_eq!(tasks[0].stage2_result, "P:\none");
    }

    #[tokio::test]
    async fn run_config_reads_current_prefix_and_delay() {
        let store = TaskStore::in_memory();
        let controller =
            Controller::new(store.clone(), Arc::new(NoopExecutor), ActivityLog::new(8), quick());
        store.set_prefix("latest");
        let config = controller.run_config(Stage::Generate);
        assert_eq!(config.prefix, "latest");
        assert_eq!(config.inter_task_delay, std::time::Duration::from_millis(10));
    }

    #[tokio::test]
    async fn status_reports_queues() {
        let store = TaskStore::in_memory();
        store.parse("a\nb\nc").unwrap();
        let ids: Vec<_> = store.all().into_iter().map(|t| t.id).collect();
        store.update(
            &ids[0],
            &promptsmith_core_types::TaskPatch::status(TaskStatus::Stage1Done)
                .with_stage1_result("x"),
        );
        let controller =
            Controller::new(store, Arc::new(NoopExecutor), ActivityLog::new(8), quick());

        let status = controller.status();
        assert_eq!(status.total, 3);
        assert_eq!(status.rewrite.queued, 2);
        assert_eq!(status.generate.queued, 1);
        assert!(!status.rewrite.running);
        assert!(!controller.stop_all());
    }
}
