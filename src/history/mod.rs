//! History service: a small record of generated images kept outside the task store.
//!
//! The server side (`server` module) persists records in a [`HistoryStore`]; the pipeline
//! reaches it through a [`HistoryClient`], which doubles as the generate runner's result sink.

mod client;
mod model;
mod store;

use promptsmith_core_types::PipelineError;
use thiserror::Error;

pub use client::HistoryClient;
pub use model::{HistoryRecord, NewHistoryRecord, ORIGINAL_TEXT_REQUIRED};
pub use store::{HistoryStore, DEFAULT_LIMIT};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("{0}")]
    Validation(String),
    #[error("history storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("history record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("history service unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("history service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl From<HistoryError> for PipelineError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::Validation(message) => PipelineError::Validation(message),
            HistoryError::Http(err) => PipelineError::Channel(err.to_string()),
            other => PipelineError::Storage(other.to_string()),
        }
    }
}
