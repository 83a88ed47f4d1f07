use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use promptsmith_core_types::{
    PipelineError, Stage, StatusCounts, Task, TaskId, TaskPatch, TaskStatus,
};

use crate::backend::{MemoryBackend, PersistedState, StateBackend};
use crate::transfer::{export_tasks, parse_import, validate_ids};

/// Change notifications published after every mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    Appended { count: usize },
    Updated { id: TaskId },
    Cleared { removed: usize },
    Replaced { count: usize },
    PrefixChanged,
    PersistFailed { error: String },
}

pub struct TaskStore {
    state: Mutex<PersistedState>,
    backend: Arc<dyn StateBackend>,
    events: broadcast::Sender<StoreEvent>,
}

impl TaskStore {
    /// Loads persisted state once. When nothing was persisted the store starts empty with
    /// `default_prefix`. Tasks a previous process left in progress are requeued, unless the
    /// backend is read-only and another process may still be working on them.
    pub fn open(
        backend: Arc<dyn StateBackend>,
        default_prefix: &str,
    ) -> Result<Arc<Self>, PipelineError> {
        let mut state = backend.load()?.unwrap_or_else(|| PersistedState {
            tasks: Vec::new(),
            prefix: default_prefix.to_string(),
        });
        validate_ids(&state.tasks)?;
        if backend.is_writable() {
            let recovered = recover_interrupted(&mut state.tasks);
            if recovered > 0 {
                info!(recovered, "requeued tasks interrupted by a previous shutdown");
            }
        }
        let (events, _) = broadcast::channel(256);
        Ok(Arc::new(Self {
            state: Mutex::new(state),
            backend,
            events,
        }))
    }

    pub fn in_memory() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            state: Mutex::new(PersistedState::default()),
            backend: Arc::new(MemoryBackend::new()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Appends one pending task per non-empty trimmed line of `raw`.
    pub fn parse(&self, raw: &str) -> Result<Vec<Task>, PipelineError> {
        let created: Vec<Task> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Task::new)
            .collect();
        if created.is_empty() {
            return Err(PipelineError::Validation(
                "no non-empty lines to create tasks from".into(),
            ));
        }

        let mut state = self.state.lock();
        state.tasks.extend(created.iter().cloned());
        self.persist(&state);
        drop(state);

        debug!(count = created.len(), "appended tasks");
        self.notify(StoreEvent::Appended {
            count: created.len(),
        });
        Ok(created)
    }

    /// Removes every task. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.tasks.len();
        state.tasks.clear();
        self.persist(&state);
        drop(state);

        self.notify(StoreEvent::Cleared { removed });
        removed
    }

    /// Merges `patch` into the task with `id`. Returns `false` and leaves the store untouched
    /// when no such task exists.
    pub fn update(&self, id: &TaskId, patch: &TaskPatch) -> bool {
        let mut state = self.state.lock();
        let Some(task) = state.tasks.iter_mut().find(|task| &task.id == id) else {
            debug!(task = %id, "update for unknown task ignored");
            return false;
        };
        task.apply(patch);
        self.persist(&state);
        drop(state);

        self.notify(StoreEvent::Updated { id: id.clone() });
        true
    }

    /// Replaces the whole collection. Fails without touching the store when ids are empty or
    /// collide.
    pub fn replace_all(&self, tasks: Vec<Task>) -> Result<(), PipelineError> {
        validate_ids(&tasks)?;
        let count = tasks.len();
        let mut state = self.state.lock();
        state.tasks = tasks;
        self.persist(&state);
        drop(state);

        self.notify(StoreEvent::Replaced { count });
        Ok(())
    }

    /// Insertion-ordered subsequence of tasks matching `predicate`.
    pub fn filter<F>(&self, predicate: F) -> Vec<Task>
    where
        F: Fn(&Task) -> bool,
    {
        self.state
            .lock()
            .tasks
            .iter()
            .filter(|task| predicate(*task))
            .cloned()
            .collect()
    }

    pub fn pending_for(&self, stage: Stage) -> Vec<Task> {
        self.filter(|task| task.is_queued_for(stage))
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.state
            .lock()
            .tasks
            .iter()
            .find(|task| &task.id == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts::tally(&self.state.lock().tasks)
    }

    pub fn prefix(&self) -> String {
        self.state.lock().prefix.clone()
    }

    pub fn set_prefix(&self, prefix: impl Into<String>) {
        let mut state = self.state.lock();
        state.prefix = prefix.into();
        self.persist(&state);
        drop(state);

        self.notify(StoreEvent::PrefixChanged);
    }

    /// Pretty-printed JSON array of every task, in order.
    pub fn export_json(&self) -> Result<String, PipelineError> {
        export_tasks(&self.state.lock().tasks)
    }

    /// Replaces the collection with the tasks in `raw`. Nothing changes when the document is
    /// rejected.
    pub fn import_json(&self, raw: &str) -> Result<usize, PipelineError> {
        let tasks = parse_import(raw)?;
        let count = tasks.len();
        self.replace_all(tasks)?;
        info!(count, "imported tasks");
        Ok(count)
    }

    fn persist(&self, state: &PersistedState) {
        if let Err(err) = self.backend.save(state) {
            warn!(error = %err, "failed to persist task state");
            self.notify(StoreEvent::PersistFailed {
                error: err.to_string(),
            });
        }
    }

    fn notify(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}

/// Tasks left in progress by a previous process go back to the queue they were taken from.
fn recover_interrupted(tasks: &mut [Task]) -> usize {
    let mut recovered = 0;
    for task in tasks.iter_mut() {
        let target = match task.status {
            TaskStatus::Stage1InProgress => TaskStatus::Pending,
            TaskStatus::Stage2InProgress if !task.stage1_result.is_empty() => {
                TaskStatus::Stage1Done
            }
            TaskStatus::Stage2InProgress => TaskStatus::Pending,
            _ => continue,
        };
        task.status = target;
        task.error.clear();
        recovered += 1;
    }
    recovered
}
