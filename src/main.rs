use anyhow::Result;
use std::sync::Arc;

use sheet_insights::{config, logging, routes, services::store::SheetStore, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::load_config()?;
    tracing::info!(
        "Loaded configuration: {} API tokens, max upload {} bytes",
        config.tokens.len(),
        config.max_file_size
    );

    let store = SheetStore::open(&config.database_path)?;
    let addr = config.bind_addr;

    // Build our application state
    let state = Arc::new(AppState::new(config, store));
    let app = routes::router(state);

    // Run it
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
