use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::document::{Document, DocumentError, NodeHandle, NodeInfo};

/// Scripted in-memory page. Each node answers `describe` from a queue of snapshots; the last
/// snapshot repeats once the queue is down to one.
#[derive(Default)]
pub(crate) struct FakeDocument {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    matches: Vec<(String, String)>,
    snapshots: HashMap<String, VecDeque<NodeInfo>>,
    values: HashMap<String, String>,
    clicks: Vec<String>,
    enters: Vec<String>,
}

impl FakeDocument {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_node(self, selector: &str, handle: &str, info: NodeInfo) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.matches.push((selector.to_string(), handle.to_string()));
            state
                .snapshots
                .insert(handle.to_string(), VecDeque::from([info]));
        }
        self
    }

    pub(crate) fn with_script(self, selector: &str, handle: &str, script: Vec<NodeInfo>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.matches.push((selector.to_string(), handle.to_string()));
            state
                .snapshots
                .insert(handle.to_string(), VecDeque::from(script));
        }
        self
    }

    pub(crate) fn button(text: &str, visible: bool, enabled: bool) -> NodeInfo {
        NodeInfo {
            tag: "button".into(),
            visible,
            enabled,
            text: text.into(),
            ..NodeInfo::default()
        }
    }

    pub(crate) fn text(text: &str) -> NodeInfo {
        NodeInfo {
            tag: "div".into(),
            visible: true,
            enabled: true,
            text: text.into(),
            ..NodeInfo::default()
        }
    }

    pub(crate) fn image(src: &str, width: u32, height: u32) -> NodeInfo {
        NodeInfo {
            tag: "img".into(),
            visible: true,
            enabled: true,
            src: Some(src.into()),
            width,
            height,
            ..NodeInfo::default()
        }
    }

    pub(crate) fn value_of(&self, handle: &str) -> Option<String> {
        self.state.lock().unwrap().values.get(handle).cloned()
    }

    pub(crate) fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub(crate) fn enters(&self) -> Vec<String> {
        self.state.lock().unwrap().enters.clone()
    }
}

#[async_trait]
impl Document for FakeDocument {
    async fn query(&self, selector: &str) -> Result<Option<NodeHandle>, DocumentError> {
        Ok(self.query_all(selector).await?.into_iter().next())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<NodeHandle>, DocumentError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .matches
            .iter()
            .filter(|(candidate, _)| candidate == selector)
            .map(|(_, handle)| NodeHandle(handle.clone()))
            .collect())
    }

    async fn describe(&self, node: &NodeHandle) -> Result<NodeInfo, DocumentError> {
        let mut state = self.state.lock().unwrap();
        let queue = state
            .snapshots
            .get_mut(&node.0)
            .ok_or_else(|| DocumentError::Detached(node.0.clone()))?;
        let info = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        info.ok_or_else(|| DocumentError::Detached(node.0.clone()))
    }

    async fn set_native_value(&self, node: &NodeHandle, value: &str) -> Result<(), DocumentError> {
        self.state
            .lock()
            .unwrap()
            .values
            .insert(node.0.clone(), value.to_string());
        Ok(())
    }

    async fn click(&self, node: &NodeHandle) -> Result<(), DocumentError> {
        self.state.lock().unwrap().clicks.push(node.0.clone());
        Ok(())
    }

    async fn press_enter(&self, node: &NodeHandle) -> Result<(), DocumentError> {
        self.state.lock().unwrap().enters.push(node.0.clone());
        Ok(())
    }
}
