pub mod error;
pub mod executor;
pub mod metrics;
pub mod model;
pub mod runner;
pub mod sink;

pub use error::SchedulerError;
pub use executor::{NoopExecutor, StageExecutor};
pub use model::{RunConfig, RunOutcome, RunReport, RunState};
pub use runner::BatchRunner;
pub use sink::{NoopSink, ResultSink};
