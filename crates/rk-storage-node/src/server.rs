//! A thin HTTP façade over [`DiskStorage`]: the storage node's entire public
//! surface is five routes, each a direct translation of one engine call.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use rk_storage::DiskStorage;
use rk_types::{Block, BlockNumList, SizeInfo, SyncInfo};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::config::StorageConfig;
use crate::errors::ServerError;

pub struct ServerState {
    storage: RwLock<DiskStorage>,
    data_block_size: u32,
    key_length_max: usize,
}

/// Owns the storage engine and exposes it over HTTP. Call [`StorageServer::run`]
/// to bind and serve forever.
pub struct StorageServer {
    state: Arc<ServerState>,
    bind_addr: SocketAddr,
}

impl StorageServer {
    pub fn new(storage: DiskStorage, config: &StorageConfig) -> Result<Self, anyhow::Error> {
        let bind_addr: SocketAddr = config.bind_addr.parse()?;
        Ok(Self {
            state: Arc::new(ServerState {
                storage: RwLock::new(storage),
                data_block_size: config.data_block_size,
                key_length_max: config.key_length_max,
            }),
            bind_addr,
        })
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/store/:key", put(put_store).get(get_store).delete(delete_store))
            .route("/sync", get(get_sync))
            .route("/health", get(get_health))
            .with_state(Arc::clone(&self.state))
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        info!(addr = %self.bind_addr, "starting storage node");
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

fn normalize(key: &str, key_length_max: usize) -> Result<String, ServerError> {
    if key.len() > key_length_max {
        return Err(ServerError::BadRequest(format!(
            "key length {} exceeds max {}",
            key.len(),
            key_length_max
        )));
    }
    Ok(key.to_string())
}

#[instrument(skip(state, body))]
async fn put_store(
    State(state): State<Arc<ServerState>>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    let key = normalize(&key, state.key_length_max)?;
    let blocks = Block::deserialize_all(&body)
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let mut storage = state.storage.write().await;
    storage.write_blocks(&key, &blocks).await?;
    let size_info = SizeInfo::new(storage.data_used_size(), storage.data_total_size());
    Ok(size_info.to_bytes())
}

#[instrument(skip(state, body))]
async fn get_store(
    State(state): State<Arc<ServerState>>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    let key = normalize(&key, state.key_length_max)?;
    let requested = BlockNumList::deserialize(&body).map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let requested: HashSet<u32> = requested.block_nums.into_iter().collect();

    let storage = state.storage.read().await;
    let blocks = storage.read_blocks(&key, &requested, state.data_block_size).await?;
    Ok(Block::serialize_all(&blocks))
}

#[instrument(skip(state))]
async fn delete_store(
    State(state): State<Arc<ServerState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let key = normalize(&key, state.key_length_max)?;
    let mut storage = state.storage.write().await;
    storage.delete_blocks(&key).await?;
    let size_info = SizeInfo::new(storage.data_used_size(), storage.data_total_size());
    Ok(size_info.to_bytes())
}

async fn get_sync(State(state): State<Arc<ServerState>>) -> Result<impl IntoResponse, ServerError> {
    let storage = state.storage.read().await;
    let mut key_block_nums = std::collections::BTreeMap::new();
    for key in storage.get_keys() {
        let block_nums = storage.get_block_nums(&key, state.data_block_size).await?;
        key_block_nums.insert(key, block_nums);
    }
    let size_info = SizeInfo::new(storage.data_used_size(), storage.data_total_size());
    let sync_info = SyncInfo::new(key_block_nums, size_info);
    Ok(sync_info.to_bytes(state.key_length_max))
}

async fn get_health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
