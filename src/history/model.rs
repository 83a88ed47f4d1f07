use chrono::{DateTime, Utc};
use promptsmith_core_types::{Task, TaskStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::HistoryError;

pub const ORIGINAL_TEXT_REQUIRED: &str = "Please provide the original text";

/// One finished (or abandoned) task as kept by the history service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: Uuid,
    pub original_text: String,
    #[serde(default, alias = "doubaoPrompt", skip_serializing_if = "Option::is_none")]
    pub stage1_result: Option<String>,
    #[serde(default, alias = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub stage2_result: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

/// Body of a create request, before validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryRecord {
    #[serde(default)]
    pub original_text: Option<String>,
    #[serde(default, alias = "doubaoPrompt", skip_serializing_if = "Option::is_none")]
    pub stage1_result: Option<String>,
    #[serde(default, alias = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub stage2_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl NewHistoryRecord {
    pub fn from_task(task: &Task) -> Self {
        Self {
            original_text: Some(task.original_text.clone()),
            stage1_result: non_empty(&task.stage1_result),
            stage2_result: non_empty(&task.stage2_result),
            status: Some(task.status.as_str().to_string()),
        }
    }

    /// Checks the request and stamps it with an id and creation time.
    pub fn validate(self, now: DateTime<Utc>) -> Result<HistoryRecord, HistoryError> {
        let original_text = self
            .original_text
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| HistoryError::Validation(ORIGINAL_TEXT_REQUIRED.to_string()))?;
        let status = match self.status.as_deref() {
            None => TaskStatus::Pending,
            Some(raw) => raw.parse().map_err(|_| {
                HistoryError::Validation(format!("`{raw}` is not a valid status"))
            })?,
        };
        Ok(HistoryRecord {
            id: Uuid::new_v4(),
            original_text,
            stage1_result: self.stage1_result,
            stage2_result: self.stage2_result,
            status,
            created_at: now,
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
