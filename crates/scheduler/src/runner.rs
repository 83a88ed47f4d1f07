use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use promptsmith_core_types::{ExecutionRequest, Stage, Task, TaskPatch, TaskStatus};
use promptsmith_event_bus::ActivityLog;
use promptsmith_task_store::TaskStore;

use crate::error::SchedulerError;
use crate::executor::StageExecutor;
use crate::metrics;
use crate::model::{RunConfig, RunOutcome, RunReport, RunState, StateCell};
use crate::sink::{NoopSink, ResultSink};

const PREVIEW_CHARS: usize = 24;

/// Runs one stage over the tasks queued for it, strictly one task at a time.
///
/// The queue is snapshotted when a run starts; tasks added later wait for the next run.
/// `stop` is cooperative: it takes effect before the next task, never mid-task.
pub struct BatchRunner<E>
where
    E: StageExecutor + 'static,
{
    stage: Stage,
    store: Arc<TaskStore>,
    executor: Arc<E>,
    activity: Arc<ActivityLog>,
    sink: Arc<dyn ResultSink>,
    state: StateCell,
    cancel: Mutex<Option<CancellationToken>>,
}

/// Returns the runner to idle however the run ends.
struct RunGuard<'a> {
    state: &'a StateCell,
    cancel: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.cancel.lock().take();
        self.state.finish();
    }
}

enum TaskResult {
    Succeeded,
    Failed,
}

impl<E> BatchRunner<E>
where
    E: StageExecutor + 'static,
{
    pub fn new(
        stage: Stage,
        store: Arc<TaskStore>,
        executor: Arc<E>,
        activity: Arc<ActivityLog>,
    ) -> Self {
        Self {
            stage,
            store,
            executor,
            activity,
            sink: Arc::new(NoopSink),
            state: StateCell::new(),
            cancel: Mutex::new(None),
        }
    }

    /// Tasks finishing the generate stage are handed to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn state(&self) -> RunState {
        self.state.get()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Requests a cooperative stop. Returns false when no run is active.
    pub fn stop(&self) -> bool {
        match self.cancel.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Runs the stage to completion (or until stopped) and reports what happened.
    pub async fn start(&self, config: RunConfig) -> Result<RunReport, SchedulerError> {
        if !self.state.try_begin() {
            return Err(SchedulerError::AlreadyRunning(self.stage));
        }
        let token = CancellationToken::new();
        *self.cancel.lock() = Some(token.clone());
        let _guard = RunGuard {
            state: &self.state,
            cancel: &self.cancel,
        };
        metrics::record_run(self.stage);

        let stage = self.stage;
        let site = stage.site();
        if !self.executor.is_available(site) {
            warn!(target: "scheduler", %stage, %site, "execution context not registered");
            self.activity.error(format!(
                "{stage} not started: {site} context not found; open the {site} page first"
            ));
            let mut report = RunReport::new(stage, 0);
            report.outcome = RunOutcome::Unavailable;
            return Ok(report);
        }

        let snapshot = self.store.pending_for(stage);
        let mut report = RunReport::new(stage, snapshot.len());
        info!(target: "scheduler", %stage, queued = snapshot.len(), "run started");
        self.activity
            .info(format!("{stage} started: {} task(s) queued", snapshot.len()));

        for task in snapshot {
            if token.is_cancelled() {
                report.outcome = RunOutcome::Stopped;
                break;
            }

            match self.process(&task, &config).await {
                TaskResult::Succeeded => report.succeeded += 1,
                TaskResult::Failed => report.failed += 1,
            }
            report.processed += 1;

            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(config.inter_task_delay) => {}
            }
        }

        match report.outcome {
            RunOutcome::Stopped => {
                metrics::record_stopped(stage);
                self.activity.warn(format!(
                    "{stage} stopped after {} of {} task(s)",
                    report.processed, report.queued
                ));
            }
            _ => self.activity.info(format!(
                "{stage} finished: {} succeeded, {} failed",
                report.succeeded, report.failed
            )),
        }
        info!(
            target: "scheduler",
            %stage,
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            outcome = ?report.outcome,
            "run finished"
        );
        Ok(report)
    }

    async fn process(&self, task: &Task, config: &RunConfig) -> TaskResult {
        let stage = self.stage;
        let Some(payload) = stage.payload_for(task, &config.prefix) else {
            let message = match stage {
                Stage::Rewrite => "task has no text to rewrite",
                Stage::Generate => "task has no rewritten prompt",
            };
            return self.fail(task, message.to_string());
        };

        metrics::record_started(stage);
        self.store.update(
            &task.id,
            &TaskPatch::status(stage.in_progress()).clear_error(),
        );

        let outcome = self
            .executor
            .execute(ExecutionRequest::new(stage.action(), payload))
            .await;

        match outcome.into_result() {
            Ok(result) if !result.trim().is_empty() => self.succeed(task, result).await,
            Ok(_) => self.fail(task, "empty result".to_string()),
            Err(message) if message.trim().is_empty() => {
                self.fail(task, "unknown error".to_string())
            }
            Err(message) => self.fail(task, message),
        }
    }

    async fn succeed(&self, task: &Task, result: String) -> TaskResult {
        let stage = self.stage;
        let patch = match stage {
            Stage::Rewrite => TaskPatch::status(stage.done()).with_stage1_result(result),
            Stage::Generate => TaskPatch::status(stage.done()).with_stage2_result(result),
        }
        .clear_error();
        self.store.update(&task.id, &patch);
        metrics::record_succeeded(stage);
        self.activity
            .info(format!("{stage} done: \"{}\"", preview(&task.original_text)));

        if stage == Stage::Generate {
            if let Some(finished) = self.store.get(&task.id) {
                if let Err(err) = self.sink.record(&finished).await {
                    warn!(target: "scheduler", task = %task.id, %err, "result sink rejected task");
                    self.activity.warn(format!(
                        "result for \"{}\" was not saved to history: {err}",
                        preview(&task.original_text)
                    ));
                }
            }
        }
        TaskResult::Succeeded
    }

    fn fail(&self, task: &Task, message: String) -> TaskResult {
        let stage = self.stage;
        warn!(target: "scheduler", %stage, task = %task.id, error = %message, "task failed");
        self.activity.error(format!(
            "{stage} failed for \"{}\": {message}",
            preview(&task.original_text)
        ));
        self.store.update(
            &task.id,
            &TaskPatch::status(TaskStatus::Failed).with_error(message),
        );
        metrics::record_failed(stage);
        TaskResult::Failed
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use promptsmith_core_types::{ExecutionOutcome, PipelineError, SiteAction, SiteId, TaskStatus};
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    struct MockExecutor {
        available: bool,
        calls: Arc<AsyncMutex<Vec<ExecutionRequest>>>,
        replies: parking_lot::Mutex<VecDeque<ExecutionOutcome>>,
    }

    impl MockExecutor {
        fn replying(replies: Vec<ExecutionOutcome>) -> Arc<Self> {
            Arc::new(Self {
                available: true,
                calls: Arc::new(AsyncMutex::new(Vec::new())),
                replies: parking_lot::Mutex::new(replies.into()),
            })
        }

        async fn payloads(&self) -> Vec<String> {
            self.calls
                .lock()
                .await
                .iter()
                .map(|request| request.payload.clone())
                .collect()
        }
    }

    #[async_trait]
    impl StageExecutor for MockExecutor {
        fn is_available(&self, _site: SiteId) -> bool {
            self.available
        }

        async fn execute(&self, request: ExecutionRequest) -> ExecutionOutcome {
            self.calls.lock().await.push(request.clone());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| ExecutionOutcome::success(format!("out:{}", request.payload)))
        }
    }

    struct RecordingSink {
        recorded: Arc<AsyncMutex<Vec<Task>>>,
        fail: bool,
    }

    #[async_trait]
    impl ResultSink for RecordingSink {
        async fn record(&self, task: &Task) -> Result<(), PipelineError> {
            self.recorded.lock().await.push(task.clone());
            if self.fail {
                Err(PipelineError::Storage("history service unreachable".into()))
            } else {
                Ok(())
            }
        }
    }

    fn task(text: &str, status: TaskStatus) -> Task {
        let mut task = Task::new(text);
        task.status = status;
        match status {
            TaskStatus::Failed => task.error = "earlier failure".into(),
            TaskStatus::Stage1Done => task.stage1_result = format!("prompt for {text}"),
            TaskStatus::Completed => {
                task.stage1_result = format!("prompt for {text}");
                task.stage2_result = "https://img/done.png".into();
            }
            _ => {}
        }
        task
    }

    fn quick(stage: Stage, prefix: &str) -> RunConfig {
        RunConfig::for_stage(stage, prefix).with_delay(Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn rewrite_picks_pending_and_failed_only() {
        let store = TaskStore::in_memory();
        let tasks = vec![
            task("a fox", TaskStatus::Pending),
            task("a crow", TaskStatus::Failed),
            task("a whale", TaskStatus::Stage1Done),
            task("a moth", TaskStatus::Completed),
        ];
        store.replace_all(tasks.clone()).unwrap();
        let executor = MockExecutor::replying(Vec::new());
        let runner = BatchRunner::new(
            Stage::Rewrite,
            store.clone(),
            executor.clone(),
            ActivityLog::new(64),
        );

        let report = runner.start(quick(Stage::Rewrite, "Describe:")).await.unwrap();

        assert_eq!(report.queued, 2);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(
            executor.payloads().await,
            vec!["Describe:\na fox".to_string(), "Describe:\na crow".to_string()]
        );
        let after = store.all();
        assert_eq!(after[0].status, TaskStatus::Stage1Done);
        assert_eq!(after[0].stage1_result, "out:Describe:\na fox");
        assert_eq!(after[1].status, TaskStatus::Stage1Done);
        assert!(after[1].error.is_empty());
        assert_eq!(after[2], tasks[2]);
        assert_eq!(after[3], tasks[3]);
        assert_eq!(runner.state(), RunState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_prefix_sends_text_alone() {
        let store = TaskStore::in_memory();
        store.parse("a fox").unwrap();
        let executor = MockExecutor::replying(Vec::new());
        let runner = BatchRunner::new(Stage::Rewrite, store, executor.clone(), ActivityLog::new(8));

        runner.start(quick(Stage::Rewrite, "   ")).await.unwrap();
        assert_eq!(executor.payloads().await, vec!["a fox".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_record_message_and_batch_continues() {
        let store = TaskStore::in_memory();
        store.parse("one\ntwo\nthree").unwrap();
        let executor = MockExecutor::replying(vec![
            ExecutionOutcome::failure(&PipelineError::ElementNotFound("no input".into())),
            ExecutionOutcome::success("  "),
            ExecutionOutcome::failure_message(""),
        ]);
        let activity = ActivityLog::new(64);
        let runner = BatchRunner::new(Stage::Rewrite, store.clone(), executor, activity.clone());

        let report = runner.start(quick(Stage::Rewrite, "")).await.unwrap();

        assert_eq!(report.failed, 3);
        let errors: Vec<String> = store.all().into_iter().map(|task| task.error).collect();
        assert_eq!(
            errors,
            vec![
                "element not found: no input".to_string(),
                "empty result".to_string(),
                "unknown error".to_string()
            ]
        );
        for task in store.all() {
            assert_eq!(task.status, TaskStatus::Failed);
            task.check_invariants().unwrap();
        }
        let failures = activity
            .snapshot()
            .into_iter()
            .filter(|line| line.message.contains("failed for"))
            .count();
        assert_eq!(failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_context_leaves_tasks_alone() {
        let store = TaskStore::in_memory();
        store.parse("one").unwrap();
        let executor = Arc::new(MockExecutor {
            available: false,
            calls: Arc::new(AsyncMutex::new(Vec::new())),
            replies: parking_lot::Mutex::new(VecDeque::new()),
        });
        let activity = ActivityLog::new(8);
        let runner = BatchRunner::new(Stage::Rewrite, store.clone(), executor.clone(), activity.clone());

        let report = runner.start(quick(Stage::Rewrite, "")).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Unavailable);
        assert!(executor.payloads().await.is_empty());
        assert_eq!(store.all()[0].status, TaskStatus::Pending);
        assert!(activity.snapshot()[0].message.contains("context not found"));
        assert!(!runner.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn generate_success_reaches_sink_even_when_sink_fails() {
        let store = TaskStore::in_memory();
        store
            .replace_all(vec![task("a fox", TaskStatus::Stage1Done)])
            .unwrap();
        let recorded = Arc::new(AsyncMutex::new(Vec::new()));
        let executor = MockExecutor::replying(vec![ExecutionOutcome::success("https://img/1.png")]);
        let activity = ActivityLog::new(16);
        let runner = BatchRunner::new(Stage::Generate, store.clone(), executor.clone(), activity.clone())
            .with_sink(Arc::new(RecordingSink {
                recorded: recorded.clone(),
                fail: true,
            }));

        runner.start(quick(Stage::Generate, "ignored")).await.unwrap();

        assert_eq!(executor.payloads().await, vec!["prompt for a fox".to_string()]);
        assert_eq!(executor.calls.lock().await[0].action, SiteAction::FillGenerator);
        let done = &store.all()[0];
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.stage2_result, "https://img/1.png");
        let recorded = recorded.lock().await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].status, TaskStatus::Completed);
        assert!(activity
            .snapshot()
            .iter()
            .any(|line| line.message.contains("not saved to history")));
    }

    #[tokio::test(start_paused = true)]
    async fn generate_failure_requeues_through_rewrite() {
        let store = TaskStore::in_memory();
        store
            .replace_all(vec![task("a fox", TaskStatus::Stage1Done)])
            .unwrap();
        let executor = MockExecutor::replying(vec![ExecutionOutcome::failure(
            &PipelineError::Timeout("no generated image after 60 polls".into()),
        )]);
        let runner = BatchRunner::new(Stage::Generate, store.clone(), executor, ActivityLog::new(8));

        runner.start(quick(Stage::Generate, "")).await.unwrap();

        let failed = &store.all()[0];
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.stage1_result, "prompt for a fox");
        assert!(store.pending_for(Stage::Generate).is_empty());
        assert_eq!(store.pending_for(Stage::Rewrite).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_run_is_noop() {
        let runner = BatchRunner::new(
            Stage::Rewrite,
            TaskStore::in_memory(),
            MockExecutor::replying(Vec::new()),
            ActivityLog::new(8),
        );
        assert!(!runner.stop());
        let report = runner.start(quick(Stage::Rewrite, "")).await.unwrap();
        assert_eq!(report.queued, 0);
        assert_eq!(report.outcome, RunOutcome::Completed);
    }

    #[test]
    fn preview_truncates_long_text() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(40);
        assert_eq!(preview(&long), format!("{}…", "x".repeat(PREVIEW_CHARS)));
    }
}
