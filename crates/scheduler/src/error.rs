use promptsmith_core_types::{PipelineError, Stage};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("{0} runner is already running")]
    AlreadyRunning(Stage),
}

impl From<SchedulerError> for PipelineError {
    fn from(value: SchedulerError) -> Self {
        PipelineError::Validation(value.to_string())
    }
}
