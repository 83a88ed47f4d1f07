use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::site::Stage;

/// Stable task identifier. Fresh ids are UUID v4 strings; numeric ids from older exports are
/// accepted and kept as their decimal text.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Ok(Self(text)),
            RawId::Number(number) => Ok(Self(number.to_string())),
        }
    }
}

/// Lifecycle of a task through both stages.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    #[serde(alias = "processing_doubao")]
    Stage1InProgress,
    #[serde(alias = "doubao_completed")]
    Stage1Done,
    #[serde(alias = "processing_liblib")]
    Stage2InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::Stage1InProgress,
        TaskStatus::Stage1Done,
        TaskStatus::Stage2InProgress,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Stage1InProgress => "stage1_in_progress",
            TaskStatus::Stage1Done => "stage1_done",
            TaskStatus::Stage2InProgress => "stage2_in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            TaskStatus::Stage1InProgress | TaskStatus::Stage2InProgress
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "stage1_in_progress" | "processing_doubao" => Ok(TaskStatus::Stage1InProgress),
            "stage1_done" | "doubao_completed" => Ok(TaskStatus::Stage1Done),
            "stage2_in_progress" | "processing_liblib" => Ok(TaskStatus::Stage2InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(PipelineError::Validation(format!("unknown task status '{other}'"))),
        }
    }
}

/// One unit of work: a raw input line and whatever both stages produced from it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub original_text: String,
    #[serde(default, alias = "doubaoPrompt", deserialize_with = "null_as_empty")]
    pub stage1_result: String,
    #[serde(default, alias = "imageUrl", deserialize_with = "null_as_empty")]
    pub stage2_result: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub error: String,
}

impl Task {
    pub fn new(original_text: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            original_text: original_text.into(),
            stage1_result: String::new(),
            stage2_result: String::new(),
            status: TaskStatus::Pending,
            error: String::new(),
        }
    }

    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(result) = &patch.stage1_result {
            self.stage1_result = result.clone();
        }
        if let Some(result) = &patch.stage2_result {
            self.stage2_result = result.clone();
        }
        if let Some(error) = &patch.error {
            self.error = error.clone();
        }
    }

    pub fn is_queued_for(&self, stage: Stage) -> bool {
        stage.accepts(self.status)
    }

    /// Checks the status/result/error consistency rules every task must satisfy once a
    /// runner has let go of it.
    pub fn check_invariants(&self) -> Result<(), String> {
        let needs_stage1 = matches!(
            self.status,
            TaskStatus::Stage1Done | TaskStatus::Stage2InProgress | TaskStatus::Completed
        );
        if needs_stage1 && self.stage1_result.is_empty() {
            return Err(format!("task {} is {} without a stage 1 result", self.id, self.status));
        }
        if self.status == TaskStatus::Completed && self.stage2_result.is_empty() {
            return Err(format!("task {} is completed without a stage 2 result", self.id));
        }
        if self.status == TaskStatus::Failed && self.error.is_empty() {
            return Err(format!("task {} failed without an error message", self.id));
        }
        if self.status != TaskStatus::Failed && !self.error.is_empty() {
            return Err(format!("task {} carries an error while {}", self.id, self.status));
        }
        Ok(())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Partial update merged into a task by id.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub stage1_result: Option<String>,
    pub stage2_result: Option<String>,
    pub error: Option<String>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_stage1_result(mut self, result: impl Into<String>) -> Self {
        self.stage1_result = Some(result.into());
        self
    }

    pub fn with_stage2_result(mut self, result: impl Into<String>) -> Self {
        self.stage2_result = Some(result.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn clear_error(self) -> Self {
        self.with_error(String::new())
    }
}

/// Per-status tally of a task collection.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub stage1_in_progress: usize,
    pub stage1_done: usize,
    pub stage2_in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn tally<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut counts = Self::default();
        for task in tasks {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Stage1InProgress => counts.stage1_in_progress += 1,
                TaskStatus::Stage1Done => counts.stage1_done += 1,
                TaskStatus::Stage2InProgress => counts.stage2_in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn queued_for(&self, stage: Stage) -> usize {
        match stage {
            Stage::Rewrite => self.pending + self.failed,
            Stage::Generate => self.stage1_done,
        }
    }

    pub fn total(&self) -> usize {
        self.pending
            + self.stage1_in_progress
            + self.stage1_done
            + self.stage2_in_progress
            + self.completed
            + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_export_records_deserialize() {
        let raw = json!({
            "id": 1718000000123.0,
            "originalText": "a red fox",
            "doubaoPrompt": "red fox, forest, watercolor",
            "imageUrl": "",
            "status": "doubao_completed",
            "error": null
        });
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.id.as_str(), "1718000000123.0");
        assert_eq!(task.stage1_result, "red fox, forest, watercolor");
        assert_eq!(task.status, TaskStatus::Stage1Done);
        assert!(task.error.is_empty());
    }

    #[test]
    fn integer_ids_keep_their_digits() {
        let task: Task =
            serde_json::from_value(json!({"id": 42, "originalText": "x"})).unwrap();
        assert_eq!(task.id.as_str(), "42");
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn serializes_with_current_field_names() {
        let mut task = Task::new("hello");
        task.apply(&TaskPatch::status(TaskStatus::Stage1Done).with_stage1_result("hi"));
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["originalText"], "hello");
        assert_eq!(value["stage1Result"], "hi");
        assert_eq!(value["status"], "stage1_done");
    }

    #[test]
    fn status_parses_aliases() {
        assert_eq!(
            "processing_liblib".parse::<TaskStatus>().unwrap(),
            TaskStatus::Stage2InProgress
        );
        assert_eq!(" FAILED ".parse::<TaskStatus>().unwrap(), TaskStatus::Failed);
        assert!(matches!(
            "archived".parse::<TaskStatus>(),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn invariants_flag_inconsistent_tasks() {
        let mut task = Task::new("x");
        assert!(task.check_invariants().is_ok());

        task.status = TaskStatus::Completed;
        task.stage1_result = "prompt".into();
        assert!(task.check_invariants().is_err());

        task.stage2_result = "https://img/1.png".into();
        assert!(task.check_invariants().is_ok());

        task.status = TaskStatus::Failed;
        assert!(task.check_invariants().is_err());
        task.error = "timeout: gave up".into();
        assert!(task.check_invariants().is_ok());
    }

    #[test]
    fn counts_feed_stage_queues() {
        let mut tasks = vec![Task::new("a"), Task::new("b"), Task::new("c")];
        tasks[1].status = TaskStatus::Failed;
        tasks[2].status = TaskStatus::Stage1Done;
        let counts = StatusCounts::tally(&tasks);
        assert_eq!(counts.queued_for(Stage::Rewrite), 2);
        assert_eq!(counts.queued_for(Stage::Generate), 1);
        assert_eq!(counts.total(), 3);
    }
}
