//! Fans requests out across the storage cluster: `MasterServer` owns the
//! shared [`MasterState`] and exposes the cluster as a single key-value
//! surface.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::Router;
use rk_types::{Block, BlockNumList, SizeInfo};
use tracing::{info, instrument};

use crate::errors::MasterError;
use crate::health;
use crate::state::MasterState;
use crate::stats;

pub struct MasterServer {
    state: Arc<MasterState>,
    bind_addr: SocketAddr,
}

impl MasterServer {
    pub fn new(state: MasterState) -> Result<Self, anyhow::Error> {
        let bind_addr: SocketAddr = state.config.master_server_ip_port.parse()?;
        Ok(Self {
            state: Arc::new(state),
            bind_addr,
        })
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/store/:key", put(put_store).get(get_store).delete(delete_store))
            .route("/keys", get(get_keys))
            .route("/stats", get(get_stats))
            .with_state(Arc::clone(&self.state))
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        let health_state = Arc::clone(&self.state);
        tokio::spawn(health::run(health_state));

        info!(addr = %self.bind_addr, "starting master server");
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

/// Snapshot of which physical node ids are currently healthy, taken once per
/// request so placement decisions within a request are self-consistent.
async fn healthy_node_ids(state: &MasterState) -> HashSet<u32> {
    state
        .storage_nodes
        .read()
        .await
        .values()
        .filter(|n| n.is_healthy)
        .map(|n| n.id)
        .collect()
}

#[instrument(skip(state, body))]
async fn put_store(
    State(state): State<Arc<MasterState>>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, MasterError> {
    let blocks = Block::split_payload(&key, &body, state.config.data_block_size);
    let replication_factor = state.config.effective_replication_factor();

    let healthy = healthy_node_ids(&state).await;
    let ring = state.ring.read().await;

    let mut node_blocks: HashMap<u32, Vec<Block>> = HashMap::new();
    let mut new_entry: BTreeMap<u32, HashSet<u32>> = BTreeMap::new();

    for block in &blocks {
        let replicas = rk_ring::place_replicas(&ring, &key, block.block_num, replication_factor, |id| {
            healthy.contains(&id)
        })?;
        for node_id in &replicas {
            node_blocks.entry(*node_id).or_default().push(block.clone());
        }
        new_entry.insert(block.block_num, replicas.into_iter().collect());
    }
    drop(ring);

    let put_one = |node_id: u32, blocks: Vec<Block>| {
        let state = Arc::clone(&state);
        async move {
            let base_url = state.storage_nodes.read().await[&node_id].base_url();
            let client = state.client_for(node_id).await;
            let payload = Block::serialize_all(&blocks);
            let resp = client
                .put(format!("{base_url}/store/{}", urlencoding_key(&blocks[0].key)))
                .body(payload)
                .send()
                .await
                .map_err(|e| MasterError::Unavailable { reason: e.to_string() })?;
            if !resp.status().is_success() {
                return Err(MasterError::Unavailable {
                    reason: format!("node {node_id} returned {}", resp.status()),
                });
            }
            let body = resp
                .bytes()
                .await
                .map_err(|e| MasterError::Unavailable { reason: e.to_string() })?;
            let size_info = SizeInfo::deserialize(&body)
                .map_err(|e| MasterError::Internal { message: e.to_string() })?;
            let blocks_added = blocks.len() as u32;
            Ok::<_, MasterError>((node_id, blocks_added, size_info))
        }
    };

    let results = futures::future::join_all(
        node_blocks
            .into_iter()
            .map(|(node_id, blocks)| put_one(node_id, blocks)),
    )
    .await;

    let mut outcomes = Vec::with_capacity(results.len());
    for result in results {
        outcomes.push(result?);
    }

    let mut nodes = state.storage_nodes.write().await;
    let mut kbn = state.kbn.write().await;

    if let Some(prior) = kbn.get(&key) {
        let mut prior_counts: HashMap<u32, u32> = HashMap::new();
        for node_ids in prior.values() {
            for node_id in node_ids {
                *prior_counts.entry(*node_id).or_default() += 1;
            }
        }
        for (node_id, count) in prior_counts {
            if let Some(node) = nodes.get_mut(&node_id) {
                node.stats.blocks_stored = node.stats.blocks_stored.saturating_sub(count);
            }
        }
    }

    for (node_id, blocks_added, size_info) in outcomes {
        if let Some(node) = nodes.get_mut(&node_id) {
            node.stats.blocks_stored += blocks_added;
            node.stats.apply_size_info(size_info.data_used_size, size_info.data_total_size);
        }
    }

    kbn.insert(key, new_entry);

    Ok(())
}

#[instrument(skip(state))]
async fn get_store(
    State(state): State<Arc<MasterState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, MasterError> {
    let block_node_map = {
        let kbn = state.kbn.read().await;
        kbn.get(&key).cloned().ok_or(MasterError::NotFound)?
    };

    let nodes = state.storage_nodes.read().await;
    let mut node_block_nums: HashMap<u32, Vec<u32>> = HashMap::new();
    for (block_num, node_ids) in &block_node_map {
        let mut sorted: Vec<&u32> = node_ids.iter().collect();
        sorted.sort();
        let chosen = sorted
            .into_iter()
            .find(|id| nodes.get(id).map(|n| n.is_healthy).unwrap_or(false))
            .ok_or_else(|| MasterError::Unavailable {
                reason: format!("no healthy node holds block {block_num}"),
            })?;
        node_block_nums.entry(*chosen).or_default().push(*block_num);
    }
    drop(nodes);

    let get_one = |node_id: u32, block_nums: Vec<u32>| {
        let state = Arc::clone(&state);
        let key = key.clone();
        async move {
            let base_url = state.storage_nodes.read().await[&node_id].base_url();
            let client = state.client_for(node_id).await;
            let payload = BlockNumList::new(block_nums).to_bytes();
            let resp = client
                .get(format!("{base_url}/store/{}", urlencoding_key(&key)))
                .body(payload)
                .send()
                .await
                .map_err(|e| MasterError::Unavailable { reason: e.to_string() })?;
            if !resp.status().is_success() {
                return Err(MasterError::Unavailable {
                    reason: format!("node {node_id} returned {}", resp.status()),
                });
            }
            let body = resp
                .bytes()
                .await
                .map_err(|e| MasterError::Unavailable { reason: e.to_string() })?;
            Block::deserialize_all(&body).map_err(|e| MasterError::Internal { message: e.to_string() })
        }
    };

    let results = futures::future::join_all(
        node_block_nums
            .into_iter()
            .map(|(node_id, block_nums)| get_one(node_id, block_nums)),
    )
    .await;

    let mut ordered: BTreeMap<u32, Block> = BTreeMap::new();
    for result in results {
        for block in result? {
            ordered.insert(block.block_num, block);
        }
    }

    let mut payload = Vec::new();
    for block in ordered.into_values() {
        payload.extend_from_slice(&block.data);
    }
    Ok(payload)
}

#[instrument(skip(state))]
async fn delete_store(
    State(state): State<Arc<MasterState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, MasterError> {
    let block_node_map = {
        let kbn = state.kbn.read().await;
        kbn.get(&key).cloned().ok_or(MasterError::NotFound)?
    };

    let mut all_node_ids: HashSet<u32> = HashSet::new();
    for node_ids in block_node_map.values() {
        all_node_ids.extend(node_ids);
    }

    let delete_one = |node_id: u32| {
        let state = Arc::clone(&state);
        let key = key.clone();
        async move {
            let base_url = state.storage_nodes.read().await[&node_id].base_url();
            let client = state.client_for(node_id).await;
            let resp = client
                .delete(format!("{base_url}/store/{}", urlencoding_key(&key)))
                .send()
                .await
                .map_err(|e| MasterError::Unavailable { reason: e.to_string() })?;
            if !resp.status().is_success() {
                return Err(MasterError::Unavailable {
                    reason: format!("node {node_id} returned {}", resp.status()),
                });
            }
            let body = resp
                .bytes()
                .await
                .map_err(|e| MasterError::Unavailable { reason: e.to_string() })?;
            let size_info = SizeInfo::deserialize(&body)
                .map_err(|e| MasterError::Internal { message: e.to_string() })?;
            Ok::<_, MasterError>((node_id, size_info))
        }
    };

    let results = futures::future::join_all(all_node_ids.into_iter().map(delete_one)).await;

    let mut nodes = state.storage_nodes.write().await;
    for result in results {
        let (node_id, size_info) = result?;
        if let Some(node) = nodes.get_mut(&node_id) {
            node.stats.apply_size_info(size_info.data_used_size, size_info.data_total_size);
        }
    }
    drop(nodes);

    state.kbn.write().await.remove(&key);
    Ok(())
}

async fn get_keys(State(state): State<Arc<MasterState>>) -> impl IntoResponse {
    let kbn = state.kbn.read().await;
    let mut keys: Vec<&String> = kbn.keys().collect();
    keys.sort();
    let mut out = String::new();
    for key in keys {
        out.push_str(key);
        out.push('\n');
    }
    out
}

async fn get_stats(State(state): State<Arc<MasterState>>) -> impl IntoResponse {
    let nodes = state.storage_nodes.read().await;
    stats::render(&nodes)
}

/// Path segments must not contain raw `/`; keys are otherwise used verbatim,
/// matching the wire format's unrestricted key bytes.
fn urlencoding_key(key: &str) -> String {
    key.replace('/', "%2F")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_encodes_slash_in_key() {
        assert_eq!(urlencoding_key("a/b"), "a%2Fb");
        assert_eq!(urlencoding_key("archive.zip"), "archive.zip");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let state = Arc::new(MasterState::new(crate::config::MasterConfig::default()));
        let result = get_store(State(state), Path("nope".to_string())).await;
        assert!(matches!(result, Err(MasterError::NotFound)));
    }
}
