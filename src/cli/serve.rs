use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use super::context::CliContext;
use crate::history::HistoryStore;
use crate::server;

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// Listen address (defaults to server.addr from the configuration)
    #[arg(long)]
    pub addr: Option<SocketAddr>,
}

pub async fn cmd_serve(args: ServeArgs, ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let addr = args.addr.unwrap_or(config.server.addr);
    let store = Arc::new(HistoryStore::new(config.history_path()));
    server::serve(addr, store).await
}
