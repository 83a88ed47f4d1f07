use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::task::{Task, TaskStatus};

/// Logical identity of an external site an execution context is attached to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteId {
    /// Chat assistant that rewrites raw text into an image prompt.
    #[serde(alias = "doubao", alias = "site_a")]
    Assistant,
    /// Image generator that turns a prompt into an image URL.
    #[serde(alias = "liblib", alias = "site_b")]
    Generator,
}

impl SiteId {
    pub const ALL: [SiteId; 2] = [SiteId::Assistant, SiteId::Generator];

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteId::Assistant => "assistant",
            SiteId::Generator => "generator",
        }
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteId {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "assistant" | "doubao" | "site_a" => Ok(SiteId::Assistant),
            "generator" | "liblib" | "site_b" => Ok(SiteId::Generator),
            other => Err(PipelineError::Validation(format!("unknown site '{other}'"))),
        }
    }
}

/// Action an execution context is asked to perform.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteAction {
    #[serde(alias = "fill_doubao")]
    FillAssistant,
    #[serde(alias = "fill_liblib")]
    FillGenerator,
}

impl SiteAction {
    pub fn for_site(site: SiteId) -> Self {
        match site {
            SiteId::Assistant => SiteAction::FillAssistant,
            SiteId::Generator => SiteAction::FillGenerator,
        }
    }

    pub fn site(&self) -> SiteId {
        match self {
            SiteAction::FillAssistant => SiteId::Assistant,
            SiteAction::FillGenerator => SiteId::Generator,
        }
    }
}

impl fmt::Display for SiteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteAction::FillAssistant => f.write_str("fill_assistant"),
            SiteAction::FillGenerator => f.write_str("fill_generator"),
        }
    }
}

/// The two pipeline steps.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage 1: raw text to image prompt.
    Rewrite,
    /// Stage 2: image prompt to image URL.
    Generate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Rewrite => "rewrite",
            Stage::Generate => "generate",
        }
    }

    pub fn site(&self) -> SiteId {
        match self {
            Stage::Rewrite => SiteId::Assistant,
            Stage::Generate => SiteId::Generator,
        }
    }

    pub fn action(&self) -> SiteAction {
        SiteAction::for_site(self.site())
    }

    /// Statuses this stage picks up when it snapshots its queue. Stage 1 also retries failed
    /// tasks, including ones that failed in stage 2.
    pub fn accepts(&self, status: TaskStatus) -> bool {
        match self {
            Stage::Rewrite => matches!(status, TaskStatus::Pending | TaskStatus::Failed),
            Stage::Generate => status == TaskStatus::Stage1Done,
        }
    }

    pub fn in_progress(&self) -> TaskStatus {
        match self {
            Stage::Rewrite => TaskStatus::Stage1InProgress,
            Stage::Generate => TaskStatus::Stage2InProgress,
        }
    }

    pub fn done(&self) -> TaskStatus {
        match self {
            Stage::Rewrite => TaskStatus::Stage1Done,
            Stage::Generate => TaskStatus::Completed,
        }
    }

    pub fn default_delay(&self) -> Duration {
        match self {
            Stage::Rewrite => Duration::from_millis(2_000),
            Stage::Generate => Duration::from_millis(3_000),
        }
    }

    /// Builds the payload sent to this stage's site, or `None` when the task has nothing to
    /// send.
    pub fn payload_for(&self, task: &Task, prefix: &str) -> Option<String> {
        match self {
            Stage::Rewrite => {
                if task.original_text.trim().is_empty() {
                    return None;
                }
                if prefix.trim().is_empty() {
                    Some(task.original_text.clone())
                } else {
                    Some(format!("{prefix}\n{}", task.original_text))
                }
            }
            Stage::Generate => {
                (!task.stage1_result.trim().is_empty()).then(|| task.stage1_result.clone())
            }
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request relayed to an execution context.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub action: SiteAction,
    pub payload: String,
}

impl ExecutionRequest {
    pub fn new(action: SiteAction, payload: impl Into<String>) -> Self {
        Self {
            action,
            payload: payload.into(),
        }
    }

    pub fn site(&self) -> SiteId {
        self.action.site()
    }
}

/// Normalized result of an execution, whichever side of the boundary failed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn success(data: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn failure(error: &PipelineError) -> Self {
        Self::failure_message(error.to_string())
    }

    pub fn failure_message(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Collapses the outcome into the value on success or the failure message otherwise.
    pub fn into_result(self) -> Result<String, String> {
        if self.success {
            Ok(self.data.unwrap_or_default())
        } else {
            Err(self.error.unwrap_or_default())
        }
    }
}

impl From<Result<String, PipelineError>> for ExecutionOutcome {
    fn from(value: Result<String, PipelineError>) -> Self {
        match value {
            Ok(data) => Self::success(data),
            Err(err) => Self::failure(&err),
        }
    }
}
