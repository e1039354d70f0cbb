use anyhow::Result;

use storymint_clients::connect;
use storymint_common::load_dotenv;
use storymint_service_api::setup_tracing;

/// Creates missing tables. `--reset` drops every table first.
#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    setup_tracing();

    let reset = std::env::args().any(|arg| arg == "--reset");
    if reset {
        tracing::warn!("[init_db] dropping existing tables");
    }

    connect(reset, true).await?;
    tracing::info!("[init_db] database initialized successfully");
    Ok(())
}
