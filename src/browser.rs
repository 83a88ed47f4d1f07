//! Live execution contexts backed by real browser tabs.
//!
//! One tab per site: the page is wrapped in its site adapter, the adapter runs as a content
//! context, and the context announces itself through the runtime relay exactly like an
//! injected content script would. When the browser connection ends every context is
//! unregistered so runs fail fast with "context not found".

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use cdp_adapter::BrowserSession;
use context_bridge::relay::{MessageSender, RuntimeRelay};
use context_bridge::{spawn_context, BridgeEvent, ContextHandle, ExecutionBridge};
use promptsmith_core_types::SiteId;
use promptsmith_event_bus::ActivityLog;
use serde_json::json;
use site_adapters::{
    AdapterContext, ChatAssistantAdapter, Document, ImageGeneratorAdapter, SiteAdapter,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, SitesConfig};

const CONTEXT_QUEUE: usize = 8;

/// A registered context and the task serving it.
pub struct AttachedContext {
    pub site: SiteId,
    pub handle: ContextHandle,
    task: JoinHandle<()>,
}

impl AttachedContext {
    fn detach(self, relay: &RuntimeRelay) {
        if relay.tab_removed(self.handle).is_some() {
            info!(site = %self.site, handle = %self.handle, "context detached");
        }
        self.task.abort();
    }
}

/// Builds the adapter for `site` on top of `document` and registers it with the bridge.
pub async fn attach_context(
    relay: &RuntimeRelay,
    site: SiteId,
    document: Arc<dyn Document>,
    sites: &SitesConfig,
) -> Result<AttachedContext> {
    let adapter: Arc<dyn SiteAdapter> = match site {
        SiteId::Assistant => Arc::new(ChatAssistantAdapter::new(
            document,
            sites.assistant.clone(),
        )),
        SiteId::Generator => Arc::new(ImageGeneratorAdapter::new(
            document,
            sites.generator.clone(),
        )),
    };
    let (endpoint, task) = spawn_context(AdapterContext::new(adapter), CONTEXT_QUEUE);

    let response = relay
        .handle(
            json!({ "action": "register_tab", "site": site }),
            MessageSender::tab(endpoint),
        )
        .await;
    let handle = response
        .get("handle")
        .cloned()
        .and_then(|raw| serde_json::from_value::<ContextHandle>(raw).ok());
    match handle {
        Some(handle) => Ok(AttachedContext { site, handle, task }),
        None => {
            task.abort();
            Err(anyhow!("{site} context registration refused: {response}"))
        }
    }
}

/// Where pages come from: a browser session in production, scripted pages in tests.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn open_page(&self, url: &str) -> Result<Arc<dyn Document>>;

    async fn shutdown(&self) -> Result<()>;
}

#[async_trait]
impl PageSource for BrowserSession {
    async fn open_page(&self, url: &str) -> Result<Arc<dyn Document>> {
        let document: Arc<dyn Document> = self.open_document(url).await?;
        Ok(document)
    }

    async fn shutdown(&self) -> Result<()> {
        self.close().await.context("failed to close browser session")
    }
}

fn site_url(sites: &SitesConfig, site: SiteId) -> &str {
    match site {
        SiteId::Assistant => sites.assistant.url.as_str(),
        SiteId::Generator => sites.generator.url.as_str(),
    }
}

/// Opens and attaches one page per site. When any site fails, the contexts attached so far are
/// unregistered and `source` is shut down before the error is returned.
pub async fn attach_sites<S>(
    relay: &RuntimeRelay,
    source: &S,
    sites: &[SiteId],
    profiles: &SitesConfig,
) -> Result<Vec<AttachedContext>>
where
    S: PageSource + ?Sized,
{
    let mut attached = Vec::with_capacity(sites.len());
    for &site in sites {
        match attach_site(relay, source, site, profiles).await {
            Ok(context) => attached.push(context),
            Err(err) => {
                warn!(%site, error = %err, attached = attached.len(), "attach failed; rolling back");
                for context in attached {
                    context.detach(relay);
                }
                if let Err(close_err) = source.shutdown().await {
                    warn!(error = %close_err, "page source did not shut down cleanly");
                }
                return Err(err);
            }
        }
    }
    Ok(attached)
}

async fn attach_site<S>(
    relay: &RuntimeRelay,
    source: &S,
    site: SiteId,
    profiles: &SitesConfig,
) -> Result<AttachedContext>
where
    S: PageSource + ?Sized,
{
    let url = site_url(profiles, site);
    let document = source
        .open_page(url)
        .await
        .with_context(|| format!("failed to open {site} page at {url}"))?;
    let context = attach_context(relay, site, document, profiles).await?;
    info!(%site, %url, handle = %context.handle, "context attached");
    Ok(context)
}

/// Mirrors page registration changes into the activity log.
pub fn report_contexts(bridge: &ExecutionBridge, activity: Arc<ActivityLog>) -> JoinHandle<()> {
    let mut events = bridge.events.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(BridgeEvent::ContextRegistered { site, kind, .. }) => {
                    activity.info(format!("{site} page connected ({kind:?})"));
                }
                Ok(BridgeEvent::ContextClosed { site, .. }) => {
                    activity.warn(format!("{site} page disconnected"));
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "bridge events lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Browser session plus the contexts opened in it.
pub struct LiveContexts {
    session: Arc<BrowserSession>,
    relay: Arc<RuntimeRelay>,
    attached: Arc<parking_lot::Mutex<Vec<AttachedContext>>>,
    watcher: JoinHandle<()>,
}

impl LiveContexts {
    /// Launches (or attaches to) the browser and opens a tab for every site in `sites`.
    pub async fn open(
        config: &AppConfig,
        bridge: Arc<ExecutionBridge>,
        sites: &[SiteId],
    ) -> Result<Self> {
        let session = Arc::new(
            BrowserSession::start(&config.browser)
                .await
                .context("failed to start browser session")?,
        );
        let relay = Arc::new(RuntimeRelay::new(bridge));
        let attached = attach_sites(relay.as_ref(), session.as_ref(), sites, &config.sites).await?;

        let attached = Arc::new(parking_lot::Mutex::new(attached));
        let watcher = tokio::spawn({
            let closed = session.closed();
            let relay = Arc::clone(&relay);
            let attached = Arc::clone(&attached);
            async move {
                closed.cancelled().await;
                warn!("browser connection ended; detaching contexts");
                for context in attached.lock().drain(..) {
                    context.detach(&relay);
                }
            }
        });

        Ok(Self {
            session,
            relay,
            attached,
            watcher,
        })
    }

    pub fn sites(&self) -> Vec<SiteId> {
        self.attached.lock().iter().map(|context| context.site).collect()
    }

    pub async fn close(self) -> Result<()> {
        self.watcher.abort();
        for context in self.attached.lock().drain(..) {
            context.detach(&self.relay);
        }
        self.session
            .close()
            .await
            .context("failed to close browser session")
    }
}
