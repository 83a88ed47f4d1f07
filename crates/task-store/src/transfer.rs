use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::Value;

use promptsmith_core_types::{PipelineError, Task};

/// File name offered for an export taken on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("tasks_{}.json", date.format("%Y-%m-%d"))
}

pub(crate) fn export_tasks(tasks: &[Task]) -> Result<String, PipelineError> {
    serde_json::to_string_pretty(tasks)
        .map_err(|err| PipelineError::Storage(format!("failed to encode tasks: {err}")))
}

/// Decodes an export document. The top level must be a JSON array of task records.
pub fn parse_import(raw: &str) -> Result<Vec<Task>, PipelineError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| PipelineError::Format(format!("import data is not valid JSON: {err}")))?;
    let Value::Array(records) = value else {
        return Err(PipelineError::Format(
            "import data must be a JSON array of tasks".into(),
        ));
    };
    let tasks = records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| {
            serde_json::from_value::<Task>(record)
                .map_err(|err| PipelineError::Format(format!("record {idx} is not a task: {err}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    validate_ids(&tasks)?;
    Ok(tasks)
}

pub(crate) fn validate_ids(tasks: &[Task]) -> Result<(), PipelineError> {
    let mut seen = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if task.id.as_str().trim().is_empty() {
            return Err(PipelineError::Format("task id must not be empty".into()));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(PipelineError::Format(format!("duplicate task id {}", task.id)));
        }
    }
    Ok(())
}
