//! Entry point for the Rackkey master node: owns the hash ring and the
//! key→block→node placement map, and fans client requests out across the
//! storage fleet.

use anyhow::Result;
use rk_master::{MasterConfig, MasterServer, MasterState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = MasterConfig::default().with_storage_node_ips(vec![
        "127.0.0.1:9001".to_string(),
        "127.0.0.1:9002".to_string(),
        "127.0.0.1:9003".to_string(),
    ]);

    let state = MasterState::new(config);
    let server = MasterServer::new(state)?;
    server.run().await
}
