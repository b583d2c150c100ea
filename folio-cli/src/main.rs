use anyhow::Result;
use folio_cli::app;

#[tokio::main]
async fn main() -> Result<()> {
    app::run().await
}
