//! Embedded frame contexts reached through window messages.
//!
//! The controller posts `{target: "extension_content_script", action, payload}` into the frame
//! and waits for the next `{type: "EXTENSION_RESPONSE", status, action?, message?}` coming
//! back. One request is in flight per frame and every round trip is bounded by a fixed
//! deadline. Commands carry a `requestId` that the frame echoes back; a late reply to a command
//! that already timed out is dropped instead of being taken as the answer to the next one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use promptsmith_core_types::{ExecutionOutcome, ExecutionRequest, SiteAction};

use crate::config::DEFAULT_FRAME_TIMEOUT_MS;
use crate::content::ContextHandler;
use crate::{ContextEndpoint, ContextKind, DeliveryError};

pub const FRAME_TARGET: &str = "extension_content_script";
pub const FRAME_RESPONSE_TYPE: &str = "EXTENSION_RESPONSE";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameCommand {
    pub target: String,
    pub action: SiteAction,
    pub payload: String,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: FrameStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<SiteAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
}

impl FrameResponse {
    fn from_outcome(action: SiteAction, request_id: Option<u64>, outcome: ExecutionOutcome) -> Self {
        let (status, message) = match outcome.into_result() {
            Ok(data) => (FrameStatus::Success, Some(data)),
            Err(error) => (FrameStatus::Error, Some(error)),
        };
        Self {
            kind: FRAME_RESPONSE_TYPE.to_string(),
            status,
            action: Some(action),
            message,
            request_id,
        }
    }

    fn into_outcome(self) -> ExecutionOutcome {
        match self.status {
            FrameStatus::Success => ExecutionOutcome::success(self.message.unwrap_or_default()),
            FrameStatus::Error => ExecutionOutcome::failure_message(
                self.message
                    .unwrap_or_else(|| "frame reported an error".to_string()),
            ),
        }
    }
}

/// Frame side of the window: commands arrive on `inbound`, responses leave on `outbound`.
pub struct FrameWindow {
    pub inbound: mpsc::Receiver<Value>,
    pub outbound: mpsc::Sender<Value>,
}

/// Controller-side endpoint for one embedded frame.
pub struct FrameEndpoint {
    outbound: mpsc::Sender<Value>,
    inbound: Mutex<mpsc::Receiver<Value>>,
    timeout: Duration,
    next_id: AtomicU64,
}

/// Creates a connected endpoint/window pair.
pub fn frame_channel(timeout: Duration, capacity: usize) -> (Arc<FrameEndpoint>, FrameWindow) {
    let (to_frame, frame_rx) = mpsc::channel(capacity.max(1));
    let (frame_tx, from_frame) = mpsc::channel(capacity.max(1));
    let endpoint = Arc::new(FrameEndpoint {
        outbound: to_frame,
        inbound: Mutex::new(from_frame),
        timeout,
        next_id: AtomicU64::new(1),
    });
    let window = FrameWindow {
        inbound: frame_rx,
        outbound: frame_tx,
    };
    (endpoint, window)
}

impl FrameEndpoint {
    pub fn default_timeout() -> Duration {
        Duration::from_millis(DEFAULT_FRAME_TIMEOUT_MS)
    }

    /// Discards replies still queued from earlier, abandoned round trips.
    fn drain_stale(inbound: &mut mpsc::Receiver<Value>) -> Result<(), DeliveryError> {
        let mut dropped = 0usize;
        loop {
            match inbound.try_recv() {
                Ok(_) => dropped += 1,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Err(DeliveryError::Closed),
            }
        }
        if dropped > 0 {
            debug!(dropped, "discarded stale frame replies");
        }
        Ok(())
    }

    async fn next_response(
        inbound: &mut mpsc::Receiver<Value>,
        action: SiteAction,
        request_id: u64,
    ) -> Result<ExecutionOutcome, DeliveryError> {
        loop {
            let Some(message) = inbound.recv().await else {
                return Err(DeliveryError::Closed);
            };
            if message.get("type").and_then(Value::as_str) != Some(FRAME_RESPONSE_TYPE) {
                continue;
            }
            let response: FrameResponse = serde_json::from_value(message)
                .map_err(|err| DeliveryError::Malformed(err.to_string()))?;
            if response.request_id.is_some_and(|answered| answered != request_id) {
                debug!(%action, request_id, answered = ?response.request_id, "dropping reply to an earlier command");
                continue;
            }
            if response.action.is_some_and(|answered| answered != action) {
                debug!(%action, "dropping response for a different action");
                continue;
            }
            return Ok(response.into_outcome());
        }
    }
}

#[async_trait]
impl ContextEndpoint for FrameEndpoint {
    fn kind(&self) -> ContextKind {
        ContextKind::Frame
    }

    async fn deliver(&self, request: ExecutionRequest) -> Result<ExecutionOutcome, DeliveryError> {
        let mut inbound = self.inbound.lock().await;
        Self::drain_stale(&mut inbound)?;
        let action = request.action;
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let command = FrameCommand {
            target: FRAME_TARGET.to_string(),
            action,
            payload: request.payload,
            request_id: Some(request_id),
        };
        let message =
            serde_json::to_value(&command).map_err(|err| DeliveryError::Malformed(err.to_string()))?;
        self.outbound
            .send(message)
            .await
            .map_err(|_| DeliveryError::Closed)?;

        match tokio::time::timeout(self.timeout, Self::next_response(&mut inbound, action, request_id)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::TimedOut(self.timeout)),
        }
    }
}

/// Runs the frame side: answers every command addressed to the content script and ignores
/// all other window traffic. Returns when the parent side goes away.
pub async fn serve_frame<H>(mut window: FrameWindow, handler: Arc<H>)
where
    H: ContextHandler,
{
    while let Some(message) = window.inbound.recv().await {
        if message.get("target").and_then(Value::as_str) != Some(FRAME_TARGET) {
            continue;
        }
        let request_id = message.get("requestId").and_then(Value::as_u64);
        let command: FrameCommand = match serde_json::from_value(message) {
            Ok(command) => command,
            Err(err) => {
                warn!(error = %err, "malformed frame command");
                let reply = FrameResponse {
                    kind: FRAME_RESPONSE_TYPE.to_string(),
                    status: FrameStatus::Error,
                    action: None,
                    message: Some(format!("malformed command: {err}")),
                    request_id,
                };
                if send_reply(&window.outbound, &reply).await.is_err() {
                    break;
                }
                continue;
            }
        };
        let action = command.action;
        let outcome = handler
            .handle(ExecutionRequest::new(action, command.payload))
            .await;
        let reply = FrameResponse::from_outcome(action, command.request_id, outcome);
        if send_reply(&window.outbound, &reply).await.is_err() {
            break;
        }
    }
}

async fn send_reply(outbound: &mpsc::Sender<Value>, reply: &FrameResponse) -> Result<(), ()> {
    let value = serde_json::to_value(reply).map_err(|_| ())?;
    outbound.send(value).await.map_err(|_| ())
}
