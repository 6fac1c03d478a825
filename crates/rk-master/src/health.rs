//! Background health checker: ticks on `healthCheckPeriodMs`, GETs
//! `/health` on every storage node in parallel, and updates `isHealthy`.
//! Runs for the lifetime of the process.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::state::MasterState;

pub async fn run(state: Arc<MasterState>) {
    let period = Duration::from_millis(state.config.health_check_period_ms);
    loop {
        tokio::time::sleep(period).await;
        check_once(&state).await;
    }
}

async fn check_once(state: &MasterState) {
    let node_ids: Vec<u32> = state.storage_nodes.read().await.keys().copied().collect();

    let checks = node_ids.into_iter().map(|id| {
        let state = state;
        async move {
            let (base_url, client) = {
                let nodes = state.storage_nodes.read().await;
                let node = &nodes[&id];
                (node.base_url(), state.client_for(id).await)
            };
            let healthy = client
                .get(format!("{base_url}/health"))
                .send()
                .await
                .map(|resp| resp.status().is_success())
                .unwrap_or(false);
            (id, healthy)
        }
    });

    let results = futures::future::join_all(checks).await;

    let mut nodes = state.storage_nodes.write().await;
    for (id, healthy) in results {
        if let Some(node) = nodes.get_mut(&id) {
            if node.is_healthy != healthy {
                warn!(node_id = id, healthy, "storage node health changed");
            } else {
                debug!(node_id = id, healthy, "storage node health unchanged");
            }
            node.is_healthy = healthy;
        }
    }
}
