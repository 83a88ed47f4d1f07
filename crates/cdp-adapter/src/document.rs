use async_trait::async_trait;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value;
use site_adapters::{Document, DocumentError, NodeHandle, NodeInfo};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::scripts;

/// A live browser page seen through the adapters' [`Document`] seam.
pub struct CdpDocument {
    page: Page,
    closed: CancellationToken,
}

impl CdpDocument {
    pub(crate) fn new(page: Page, closed: CancellationToken) -> Self {
        Self { page, closed }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, DocumentError> {
        if self.closed.is_cancelled() {
            return Err(DocumentError::Closed);
        }
        let result = self.page.evaluate(script).await.map_err(|err| {
            if self.closed.is_cancelled() {
                DocumentError::Closed
            } else {
                DocumentError::Script(err.to_string())
            }
        })?;
        let value = result.value().cloned().unwrap_or(Value::Null);
        trace!(target: "cdp-document", %value, "script evaluated");
        serde_json::from_value(value).map_err(|err| DocumentError::Script(err.to_string()))
    }

    async fn eval_on(&self, node: &NodeHandle, script: String) -> Result<(), DocumentError> {
        let done: Option<bool> = self.eval(script).await?;
        match done {
            Some(_) => Ok(()),
            None => Err(DocumentError::Detached(node.0.clone())),
        }
    }
}

#[async_trait]
impl Document for CdpDocument {
    async fn query(&self, selector: &str) -> Result<Option<NodeHandle>, DocumentError> {
        let tag: Option<String> = self.eval(scripts::query(selector)).await?;
        Ok(tag.map(NodeHandle))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<NodeHandle>, DocumentError> {
        let tags: Vec<String> = self.eval(scripts::query_all(selector)).await?;
        Ok(tags.into_iter().map(NodeHandle).collect())
    }

    async fn describe(&self, node: &NodeHandle) -> Result<NodeInfo, DocumentError> {
        let info: Option<NodeInfo> = self.eval(scripts::describe(&node.0)).await?;
        info.ok_or_else(|| DocumentError::Detached(node.0.clone()))
    }

    async fn set_native_value(&self, node: &NodeHandle, value: &str) -> Result<(), DocumentError> {
        self.eval_on(node, scripts::set_native_value(&node.0, value))
            .await
    }

    async fn click(&self, node: &NodeHandle) -> Result<(), DocumentError> {
        self.eval_on(node, scripts::click(&node.0)).await
    }

    async fn press_enter(&self, node: &NodeHandle) -> Result<(), DocumentError> {
        self.eval_on(node, scripts::press_enter(&node.0)).await
    }
}
