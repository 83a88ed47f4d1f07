//! Background relay speaking the runtime message protocol.
//!
//! Contexts announce themselves with `{action: "register_tab", site}`; the controller sends
//! `execute_assistant {text}` / `execute_generator {prompt}` and receives
//! `{success, result | imageUrl, error?}`; `check_tabs` reports which sites currently have a
//! context. Legacy action names (`execute_doubao`, `execute_liblib`) are accepted.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use promptsmith_core_types::{ExecutionRequest, SiteAction, SiteId};

use crate::{ContextEndpoint, ContextHandle, ExecutionBridge};

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuntimeMessage {
    RegisterTab {
        site: SiteId,
    },
    #[serde(alias = "execute_doubao")]
    ExecuteAssistant {
        #[serde(alias = "payload")]
        text: String,
    },
    #[serde(alias = "execute_liblib")]
    ExecuteGenerator {
        #[serde(alias = "payload")]
        prompt: String,
    },
    CheckTabs,
}

/// Who sent a runtime message. Only messages coming from a tab carry an endpoint.
#[derive(Clone, Default)]
pub struct MessageSender {
    pub tab: Option<Arc<dyn ContextEndpoint>>,
}

impl MessageSender {
    pub fn controller() -> Self {
        Self::default()
    }

    pub fn tab(endpoint: Arc<dyn ContextEndpoint>) -> Self {
        Self {
            tab: Some(endpoint),
        }
    }
}

pub struct RuntimeRelay {
    bridge: Arc<ExecutionBridge>,
}

impl RuntimeRelay {
    pub fn new(bridge: Arc<ExecutionBridge>) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &Arc<ExecutionBridge> {
        &self.bridge
    }

    /// Handles one raw runtime message and produces its JSON response.
    pub async fn handle(&self, message: Value, sender: MessageSender) -> Value {
        let message = match serde_json::from_value::<RuntimeMessage>(message) {
            Ok(message) => message,
            Err(err) => {
                debug!(error = %err, "ignoring unrecognised runtime message");
                return json!({ "success": false, "error": format!("unrecognised message: {err}") });
            }
        };

        match message {
            RuntimeMessage::RegisterTab { site } => match sender.tab {
                Some(endpoint) => {
                    let handle = self.bridge.register(site, endpoint);
                    json!({ "success": true, "handle": handle })
                }
                None => {
                    warn!(%site, "register_tab received without a sender tab");
                    json!({ "success": false, "error": "register_tab must come from a tab" })
                }
            },
            RuntimeMessage::ExecuteAssistant { text } => {
                let outcome = self
                    .bridge
                    .execute(ExecutionRequest::new(SiteAction::FillAssistant, text))
                    .await;
                match outcome.into_result() {
                    Ok(result) => json!({ "success": true, "result": result }),
                    Err(error) => json!({ "success": false, "error": error }),
                }
            }
            RuntimeMessage::ExecuteGenerator { prompt } => {
                let outcome = self
                    .bridge
                    .execute(ExecutionRequest::new(SiteAction::FillGenerator, prompt))
                    .await;
                match outcome.into_result() {
                    Ok(url) => json!({ "success": true, "imageUrl": url }),
                    Err(error) => json!({ "success": false, "error": error }),
                }
            }
            RuntimeMessage::CheckTabs => {
                let status = self.bridge.status();
                json!({ "assistant": status.assistant, "generator": status.generator })
            }
        }
    }

    /// A tab went away; forget whichever site it was serving.
    pub fn tab_removed(&self, handle: ContextHandle) -> Option<SiteId> {
        SiteId::ALL
            .into_iter()
            .find(|site| self.bridge.unregister(*site, handle))
    }
}
