//! Entry point for one Rackkey storage node.
//!
//! Identity comes from the environment: `NODE_ID` (decimal) names this node
//! and selects its store file, `${storeFilePrefix}${NODE_ID}`.

use anyhow::{Context, Result};
use rk_storage::DiskStorage;
use rk_storage_node::{StorageConfig, StorageServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let node_id: u32 = std::env::var("NODE_ID")
        .context("NODE_ID environment variable must be set")?
        .parse()
        .context("NODE_ID must be a decimal integer")?;

    let config = StorageConfig::default();
    let store_file_name = config.store_file_name(node_id);

    info!(node_id, store_file_name, "opening storage engine");
    let storage = DiskStorage::open(&config.store_dir_path, &store_file_name, config.engine_config())
        .await
        .context("failed to open storage engine")?;

    let server = StorageServer::new(storage, &config)?;
    server.run().await
}
