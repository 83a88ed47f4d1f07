use std::sync::Arc;

use crate::history::HistoryStore;

#[derive(Clone)]
pub struct ServeState {
    pub(crate) store: Arc<HistoryStore>,
}

impl ServeState {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }
}
