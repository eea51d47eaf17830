// rest_api/src/main.rs

use anyhow::{Context, Result};
use dotenv::dotenv;
use log::{error, info};
use tokio::sync::oneshot;

use rest_api::{AppState, load_config, start_server};
use storage::open_store;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = load_config().context("Failed to load configuration")?;
    let engine = config.storage.engine()?;
    let store = open_store(engine, &config.storage.data_directory)
        .with_context(|| format!("Failed to open {:?} store at {}", engine, config.storage.data_directory.display()))?;

    let state = AppState::new(store, &config);
    state.bootstrap(&config).await?;

    let (tx_shutdown, rx_shutdown) = oneshot::channel::<()>();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down."),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        let _ = tx_shutdown.send(());
    });

    start_server(&config, state, rx_shutdown).await
}
