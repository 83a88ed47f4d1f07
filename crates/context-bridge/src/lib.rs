//! Execution context bridge.
//!
//! The controller never touches a page directly. Each page is served by an isolated execution
//! context that announces itself for a [`SiteId`]; the bridge keeps the site → context table
//! and relays requests to whichever context currently owns the site. Delivery failures
//! (nobody registered, channel gone, deadline elapsed) and failures reported by the context
//! itself come back in the same [`ExecutionOutcome`] shape.
//!
//! Two isolation flavours are provided:
//! - [`content`]: tab contexts running as tasks behind an mpsc/oneshot channel, fronted by the
//!   JSON [`relay`] that speaks the background message protocol;
//! - [`frame`]: embedded frames reached through window-message envelopes with a fixed deadline.

pub mod config;
pub mod content;
pub mod frame;
pub mod relay;

pub use content::{spawn_context, ChannelEndpoint, ContextHandler};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use promptsmith_core_types::{ExecutionOutcome, ExecutionRequest, PipelineError, SiteId};

/// Identity of one registered execution context.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextHandle(pub Uuid);

impl ContextHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// How the context is isolated from the controller.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Tab,
    Frame,
}

/// Failure to get a request to a context or a response back.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("channel closed")]
    Closed,
    #[error("no response within {0:?}")]
    TimedOut(Duration),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Controller-side end of a channel to one execution context.
#[async_trait]
pub trait ContextEndpoint: Send + Sync {
    fn kind(&self) -> ContextKind;

    async fn deliver(&self, request: ExecutionRequest) -> Result<ExecutionOutcome, DeliveryError>;
}

pub type BridgeEventBus = broadcast::Sender<BridgeEvent>;

/// Registration changes, published so the operator sees pages come and go.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BridgeEvent {
    ContextRegistered {
        site: SiteId,
        kind: ContextKind,
        handle: ContextHandle,
    },
    ContextClosed {
        site: SiteId,
        handle: ContextHandle,
    },
}

/// Registered context handles per site, as reported to the controller UI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStatus {
    pub assistant: Option<ContextHandle>,
    pub generator: Option<ContextHandle>,
}

struct Registration {
    handle: ContextHandle,
    kind: ContextKind,
    endpoint: Arc<dyn ContextEndpoint>,
}

pub struct ExecutionBridge {
    pub events: BridgeEventBus,
    contexts: DashMap<SiteId, Registration>,
    deadline: Option<Duration>,
}

impl ExecutionBridge {
    pub fn new(events: BridgeEventBus) -> Arc<Self> {
        Self::with_deadline(events, None)
    }

    pub fn with_deadline(events: BridgeEventBus, deadline: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            events,
            contexts: DashMap::new(),
            deadline,
        })
    }

    /// Announces `endpoint` as the context for `site`, replacing any earlier registration.
    pub fn register(&self, site: SiteId, endpoint: Arc<dyn ContextEndpoint>) -> ContextHandle {
        let handle = ContextHandle::new();
        let kind = endpoint.kind();
        let previous = self.contexts.insert(
            site,
            Registration {
                handle,
                kind,
                endpoint,
            },
        );
        if let Some(previous) = previous {
            debug!(%site, old = %previous.handle, new = %handle, "context re-registered");
        }
        info!(target: "bridge", %site, ?kind, %handle, "context registered");
        let _ = self
            .events
            .send(BridgeEvent::ContextRegistered { site, kind, handle });
        handle
    }

    /// Drops the registration for `site` if it still belongs to `handle`. A stale close from a
    /// context that has already been replaced leaves the newer one alone.
    pub fn unregister(&self, site: SiteId, handle: ContextHandle) -> bool {
        let removed = self
            .contexts
            .remove_if(&site, |_, registration| registration.handle == handle)
            .is_some();
        if removed {
            info!(target: "bridge", %site, %handle, "context closed");
            let _ = self.events.send(BridgeEvent::ContextClosed { site, handle });
        }
        removed
    }

    pub fn registered(&self, site: SiteId) -> Option<ContextHandle> {
        self.contexts.get(&site).map(|entry| entry.handle)
    }

    pub fn is_registered(&self, site: SiteId) -> bool {
        self.contexts.contains_key(&site)
    }

    pub fn status(&self) -> ContextStatus {
        ContextStatus {
            assistant: self.registered(SiteId::Assistant),
            generator: self.registered(SiteId::Generator),
        }
    }

    /// Relays `request` to the context registered for its site.
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionOutcome {
        let site = request.site();
        let target = self
            .contexts
            .get(&site)
            .map(|entry| (entry.handle, Arc::clone(&entry.endpoint)));
        let Some((handle, endpoint)) = target else {
            let err = PipelineError::Channel(format!(
                "{site} context not found; open the {site} page first"
            ));
            return self.fail(site, err);
        };

        let delivery = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, endpoint.deliver(request)).await
            {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::TimedOut(deadline)),
            },
            None => endpoint.deliver(request).await,
        };

        match delivery {
            Ok(outcome) if outcome.success => outcome,
            Ok(outcome) => {
                let message = outcome
                    .error
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "unknown error".to_string());
                debug!(target: "bridge", %site, error = %message, "context reported failure");
                ExecutionOutcome::failure_message(message)
            }
            Err(DeliveryError::TimedOut(after)) => self.fail(
                site,
                PipelineError::Timeout(format!("{site} context did not answer within {after:?}")),
            ),
            Err(DeliveryError::Closed) => {
                self.unregister(site, handle);
                self.fail(
                    site,
                    PipelineError::Channel(format!(
                        "failed to communicate with {site} context: channel closed"
                    )),
                )
            }
            Err(err @ DeliveryError::Malformed(_)) => self.fail(
                site,
                PipelineError::Channel(format!("failed to communicate with {site} context: {err}")),
            ),
        }
    }

    fn fail(&self, site: SiteId, err: PipelineError) -> ExecutionOutcome {
        warn!(target: "bridge", %site, error = %err, "execution failed");
        ExecutionOutcome::failure(&err)
    }
}
