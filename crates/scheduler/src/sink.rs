use async_trait::async_trait;

use promptsmith_core_types::{PipelineError, Task};

/// Receives every task that finished the generate stage.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, task: &Task) -> Result<(), PipelineError>;
}

#[derive(Clone, Copy, Default, Debug)]
pub struct NoopSink;

#[async_trait]
impl ResultSink for NoopSink {
    async fn record(&self, _task: &Task) -> Result<(), PipelineError> {
        Ok(())
    }
}
