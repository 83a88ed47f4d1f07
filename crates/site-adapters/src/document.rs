//! Page access seam used by the adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque reference to an element that stays valid while the element is attached.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeHandle(pub String);

/// Snapshot of the element properties the adapters decide on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeInfo {
    pub tag: String,
    /// Rendered (has a layout box).
    pub visible: bool,
    pub enabled: bool,
    pub editable: bool,
    /// Rendered text content.
    pub text: String,
    pub src: Option<String>,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("script failed: {0}")]
    Script(String),
    #[error("element {0} is no longer attached")]
    Detached(String),
    #[error("page closed")]
    Closed,
}

#[async_trait]
pub trait Document: Send + Sync {
    /// First element matching `selector`.
    async fn query(&self, selector: &str) -> Result<Option<NodeHandle>, DocumentError>;

    /// Every element matching `selector`, in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<NodeHandle>, DocumentError>;

    async fn describe(&self, node: &NodeHandle) -> Result<NodeInfo, DocumentError>;

    /// Writes `value` through the element's native value setter (or its text for
    /// contenteditable elements) and dispatches bubbling `input` and `change` events.
    async fn set_native_value(&self, node: &NodeHandle, value: &str) -> Result<(), DocumentError>;

    async fn click(&self, node: &NodeHandle) -> Result<(), DocumentError>;

    /// Dispatches a bubbling Enter keydown on the element.
    async fn press_enter(&self, node: &NodeHandle) -> Result<(), DocumentError>;
}
