use async_trait::async_trait;

use context_bridge::ExecutionBridge;
use promptsmith_core_types::{ExecutionOutcome, ExecutionRequest, SiteId};

/// Where a runner sends each task's payload.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Whether a context for `site` can currently take requests.
    fn is_available(&self, site: SiteId) -> bool;

    async fn execute(&self, request: ExecutionRequest) -> ExecutionOutcome;
}

#[async_trait]
impl StageExecutor for ExecutionBridge {
    fn is_available(&self, site: SiteId) -> bool {
        self.is_registered(site)
    }

    async fn execute(&self, request: ExecutionRequest) -> ExecutionOutcome {
        ExecutionBridge::execute(self, request).await
    }
}

/// Echoes the payload back as the result.
#[derive(Clone, Copy, Default, Debug)]
pub struct NoopExecutor;

#[async_trait]
impl StageExecutor for NoopExecutor {
    fn is_available(&self, _site: SiteId) -> bool {
        true
    }

    async fn execute(&self, request: ExecutionRequest) -> ExecutionOutcome {
        ExecutionOutcome::success(request.payload)
    }
}
