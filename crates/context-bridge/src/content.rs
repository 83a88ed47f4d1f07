//! Tab execution contexts.
//!
//! A content context owns one page and processes requests strictly one at a time, in arrival
//! order. The controller reaches it through a [`ChannelEndpoint`]; when the context task ends
//! every pending and future delivery fails with [`DeliveryError::Closed`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use promptsmith_core_types::{ExecutionOutcome, ExecutionRequest};

use crate::{ContextEndpoint, ContextKind, DeliveryError};

/// Work performed inside an isolated context.
#[async_trait]
pub trait ContextHandler: Send + Sync + 'static {
    async fn handle(&self, request: ExecutionRequest) -> ExecutionOutcome;
}

struct Envelope {
    request: ExecutionRequest,
    reply: oneshot::Sender<ExecutionOutcome>,
}

pub struct ChannelEndpoint {
    tx: mpsc::Sender<Envelope>,
}

#[async_trait]
impl ContextEndpoint for ChannelEndpoint {
    fn kind(&self) -> ContextKind {
        ContextKind::Tab
    }

    async fn deliver(&self, request: ExecutionRequest) -> Result<ExecutionOutcome, DeliveryError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| DeliveryError::Closed)?;
        response.await.map_err(|_| DeliveryError::Closed)
    }
}

/// Spawns `handler` as a context task. Aborting the returned join handle closes the context.
pub fn spawn_context<H>(handler: Arc<H>, capacity: usize) -> (Arc<ChannelEndpoint>, JoinHandle<()>)
where
    H: ContextHandler,
{
    let (tx, mut rx) = mpsc::channel::<Envelope>(capacity.max(1));
    let task = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let action = envelope.request.action;
            let outcome = handler.handle(envelope.request).await;
            if envelope.reply.send(outcome).is_err() {
                debug!(%action, "requester went away before the context answered");
            }
        }
    });
    (Arc::new(ChannelEndpoint { tx }), task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptsmith_core_types::SiteAction;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Slow {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ContextHandler for Slow {
        async fn handle(&self, request: ExecutionRequest) -> ExecutionOutcome {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            ExecutionOutcome::success(request.payload)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn context_serves_requests_one_at_a_time() {
        let handler = Arc::new(Slow {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let (endpoint, _task) = spawn_context(Arc::clone(&handler), 8);

        let mut joins = Vec::new();
        for idx in 0..4 {
            let endpoint = Arc::clone(&endpoint);
            joins.push(tokio::spawn(async move {
                endpoint
                    .deliver(ExecutionRequest::new(
                        SiteAction::FillAssistant,
                        format!("p{idx}"),
                    ))
                    .await
            }));
        }
        for join in joins {
            assert!(join.await.unwrap().unwrap().success);
        }
        assert_eq!(handler.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn aborted_context_reports_closed() {
        let handler = Arc::new(Slow {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let (endpoint, task) = spawn_context(handler, 1);
        task.abort();
        let _ = task.await;

        let result = endpoint
            .deliver(ExecutionRequest::new(SiteAction::FillGenerator, "x"))
            .await;
        assert_eq!(result, Err(DeliveryError::Closed));
    }
}
