//! promptsmith library
//!
//! Exposes the controller, the browser wiring, the history service and the CLI so the
//! binary stays a thin shell and integration tests can drive every piece.

pub mod browser;
pub mod cli;
pub mod config;
pub mod controller;
pub mod history;
pub mod server;

// Re-export commonly used types for external use
pub use config::AppConfig;
pub use controller::{Controller, PipelineStatus, StageStatus};
pub use history::{HistoryClient, HistoryRecord, HistoryStore, NewHistoryRecord};
