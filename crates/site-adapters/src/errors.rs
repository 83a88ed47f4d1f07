//! Error types for site adapters

use promptsmith_core_types::PipelineError;
use thiserror::Error;

use crate::document::DocumentError;

#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    /// None of the candidate selectors matched
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// Polling budget exhausted; carries the last value observed, if any
    #[error("timeout: {message}")]
    Timeout {
        message: String,
        last_seen: Option<String>,
    },

    /// Page-level failure such as a missing submit control
    #[error("application error: {0}")]
    Application(String),

    /// Script evaluation or node access failed
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl From<AdapterError> for PipelineError {
    fn from(value: AdapterError) -> Self {
        match value {
            AdapterError::ElementNotFound(what) => PipelineError::ElementNotFound(what),
            AdapterError::Timeout { message, .. } => PipelineError::Timeout(message),
            AdapterError::Application(message) => PipelineError::Application(message),
            AdapterError::Document(err) => PipelineError::Application(err.to_string()),
        }
    }
}
