//! Operator activity feed for promptsmith.
//!
//! Run progress is reported twice: through `tracing` for whoever collects the process logs,
//! and through [`ActivityLog`] for the person watching the run.

mod activity;

pub use activity::{ActivityLog, LogLevel, LogLine};
