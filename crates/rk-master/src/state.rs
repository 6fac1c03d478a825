//! Shared state behind the master's handlers: the hash ring, the node
//! registry, the KBN placement map, and a lazily-populated HTTP client pool.

use std::collections::{BTreeMap, HashMap, HashSet};

use rk_ring::HashRing;
use tokio::sync::{Mutex, RwLock};

use crate::config::MasterConfig;
use crate::storage_node::StorageNode;

/// `key -> blockNum -> {storage node ids}`.
pub type Kbn = HashMap<String, BTreeMap<u32, HashSet<u32>>>;

pub struct MasterState {
    pub config: MasterConfig,
    pub ring: RwLock<HashRing>,
    pub storage_nodes: RwLock<HashMap<u32, StorageNode>>,
    pub kbn: RwLock<Kbn>,
    http_clients: Mutex<HashMap<u32, reqwest::Client>>,
}

impl MasterState {
    pub fn new(config: MasterConfig) -> Self {
        let mut ring = HashRing::new();
        let mut storage_nodes = HashMap::new();

        for (i, ip_port) in config.storage_node_ips.iter().enumerate() {
            let id = i as u32;
            ring.add_physical_node(ip_port, id, config.num_virtual_nodes);
            storage_nodes.insert(id, StorageNode::new(id, ip_port.clone()));
        }

        Self {
            config,
            ring: RwLock::new(ring),
            storage_nodes: RwLock::new(storage_nodes),
            kbn: RwLock::new(HashMap::new()),
            http_clients: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the pooled client for `node_id`, creating one on first use.
    /// Never evicted, per the concurrency model's "open connections" policy.
    pub async fn client_for(&self, node_id: u32) -> reqwest::Client {
        let mut clients = self.http_clients.lock().await;
        clients
            .entry(node_id)
            .or_insert_with(reqwest::Client::new)
            .clone()
    }
}
