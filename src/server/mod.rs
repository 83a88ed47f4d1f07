mod router;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::history::HistoryStore;

pub use router::build_router;
pub use state::ServeState;

/// Serves the history API on `addr` until the process is stopped.
pub async fn serve(addr: SocketAddr, store: Arc<HistoryStore>) -> Result<()> {
    let path = store.path().display().to_string();
    let router = build_router(ServeState::new(store));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind history server on {}", addr))?;
    info!(store = %path, "History API available at http://{}/tasks", addr);
    axum::serve(listener, router.into_make_service())
        .await
        .context("history server exited unexpectedly")?;
    Ok(())
}
