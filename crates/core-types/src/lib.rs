//! Shared primitives for the promptsmith pipeline crates.
//!
//! Everything that crosses a crate boundary lives here: the task model, the stage and site
//! identities, the request/outcome envelopes exchanged with execution contexts and the error
//! taxonomy every layer reports through.

mod error;
mod site;
mod task;

pub use error::PipelineError;
pub use site::{ExecutionOutcome, ExecutionRequest, SiteAction, SiteId, Stage};
pub use task::{StatusCounts, Task, TaskId, TaskPatch, TaskStatus};
