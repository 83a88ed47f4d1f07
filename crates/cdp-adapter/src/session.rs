use std::sync::Arc;

use chromiumoxide::Browser;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::document::CdpDocument;
use crate::error::SessionError;

/// One browser process (launched or attached) and the task pumping its CDP connection.
pub struct BrowserSession {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    closed: CancellationToken,
}

impl BrowserSession {
    pub async fn start(config: &CdpConfig) -> Result<Self, SessionError> {
        let (browser, mut handler) = match &config.websocket_url {
            Some(url) => {
                info!(target: "cdp-session", %url, "Attaching to running browser");
                Browser::connect(url.clone())
                    .await
                    .map_err(|err| SessionError::Connect {
                        url: url.clone(),
                        reason: err.to_string(),
                    })?
            }
            None => {
                let browser_config = config.browser_config()?;
                info!(target: "cdp-session", headless = config.headless, "Launching browser");
                Browser::launch(browser_config)
                    .await
                    .map_err(|err| SessionError::Launch(err.to_string()))?
            }
        };

        let closed = CancellationToken::new();
        let token = closed.clone();
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!(target: "cdp-session", %err, "browser handler error");
                }
            }
            info!(target: "cdp-session", "browser connection ended");
            token.cancel();
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            closed,
        })
    }

    /// Opens `url` in a new tab and waits for the first navigation to finish.
    pub async fn open_document(&self, url: &str) -> Result<Arc<CdpDocument>, SessionError> {
        if self.closed.is_cancelled() {
            return Err(SessionError::Closed);
        }
        let page = self.browser.lock().await.new_page(url).await?;
        page.wait_for_navigation().await?;
        debug!(target: "cdp-session", %url, "page ready");
        Ok(Arc::new(CdpDocument::new(page, self.closed.clone())))
    }

    /// Cancelled once the browser connection is gone.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub async fn close(&self) -> Result<(), SessionError> {
        if !self.closed.is_cancelled() {
            self.browser.lock().await.close().await?;
        }
        self.closed.cancel();
        self.handler.abort();
        Ok(())
    }
}
