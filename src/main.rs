use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    promptsmith_cli::cli::app::run().await
}
