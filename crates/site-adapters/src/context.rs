//! Hosts a site adapter inside an execution context.

use std::sync::Arc;

use async_trait::async_trait;
use context_bridge::ContextHandler;
use promptsmith_core_types::{ExecutionOutcome, ExecutionRequest, PipelineError};
use tracing::warn;

use crate::SiteAdapter;

/// Answers bridge requests addressed to its adapter's site; anything else is refused.
pub struct AdapterContext {
    adapter: Arc<dyn SiteAdapter>,
}

impl AdapterContext {
    pub fn new(adapter: Arc<dyn SiteAdapter>) -> Arc<Self> {
        Arc::new(Self { adapter })
    }
}

#[async_trait]
impl ContextHandler for AdapterContext {
    async fn handle(&self, request: ExecutionRequest) -> ExecutionOutcome {
        let site = self.adapter.site();
        if request.site() != site {
            return ExecutionOutcome::failure(&PipelineError::Application(format!(
                "{site} context cannot perform {}",
                request.action
            )));
        }

        match self.adapter.fill_and_submit(&request.payload).await {
            Ok(data) => ExecutionOutcome::success(data),
            Err(err) => {
                warn!(%site, error = %err, "adapter run failed");
                ExecutionOutcome::failure(&PipelineError::from(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AdapterError;
    use promptsmith_core_types::{SiteAction, SiteId};
    use tokio_test::{assert_err, assert_ok};

    struct Scripted(Result<String, AdapterError>);

    #[async_trait]
    impl SiteAdapter for Scripted {
        fn site(&self) -> SiteId {
            SiteId::Assistant
        }

        async fn fill_and_submit(&self, _payload: &str) -> Result<String, AdapterError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn success_carries_adapter_result() {
        let context = AdapterContext::new(Arc::new(Scripted(Ok("a fox".into()))));
        let outcome = context
            .handle(ExecutionRequest::new(SiteAction::FillAssistant, "x"))
            .await;
        assert_eq!(assert_ok!(outcome.into_result()), "a fox");
    }

    #[tokio::test]
    async fn adapter_errors_become_failures() {
        let context = AdapterContext::new(Arc::new(Scripted(Err(AdapterError::Timeout {
            message: "no stable assistant response after 15 polls".into(),
            last_seen: None,
        }))));
        let outcome = context
            .handle(ExecutionRequest::new(SiteAction::FillAssistant, "x"))
            .await;
        let message = assert_err!(outcome.into_result());
        assert!(message.starts_with("timeout:"));
    }

    #[tokio::test]
    async fn wrong_site_is_refused() {
        let context = AdapterContext::new(Arc::new(Scripted(Ok("unused".into()))));
        let outcome = context
            .handle(ExecutionRequest::new(SiteAction::FillGenerator, "x"))
            .await;
        let message = assert_err!(outcome.into_result());
        assert!(message.contains("cannot perform"));
    }
}
