//! Master configuration. Plain value struct; no file-format parsing (see
//! spec's configuration non-goal) — a binary builds one from defaults and
//! environment overrides.

#[derive(Debug, Clone)]
pub struct MasterConfig {
    pub master_server_ip_port: String,
    pub storage_node_ips: Vec<String>,
    pub health_check_period_ms: u64,
    pub num_virtual_nodes: u32,
    pub replication_factor: u32,
    pub data_block_size: u32,
    pub key_length_max: usize,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            master_server_ip_port: "0.0.0.0:9000".to_string(),
            storage_node_ips: Vec::new(),
            health_check_period_ms: 5_000,
            num_virtual_nodes: 100,
            replication_factor: 3,
            data_block_size: 4096,
            key_length_max: rk_types::DEFAULT_KEY_MAX,
        }
    }
}

impl MasterConfig {
    pub fn with_master_server_ip_port(mut self, addr: impl Into<String>) -> Self {
        self.master_server_ip_port = addr.into();
        self
    }

    pub fn with_storage_node_ips(mut self, ips: Vec<String>) -> Self {
        self.storage_node_ips = ips;
        self
    }

    pub fn with_health_check_period_ms(mut self, ms: u64) -> Self {
        self.health_check_period_ms = ms;
        self
    }

    pub fn with_num_virtual_nodes(mut self, n: u32) -> Self {
        self.num_virtual_nodes = n;
        self
    }

    pub fn with_replication_factor(mut self, r: u32) -> Self {
        self.replication_factor = r;
        self
    }

    pub fn with_data_block_size(mut self, size: u32) -> Self {
        self.data_block_size = size;
        self
    }

    pub fn with_key_length_max(mut self, len: usize) -> Self {
        self.key_length_max = len;
        self
    }

    pub fn num_storage_nodes(&self) -> u32 {
        self.storage_node_ips.len() as u32
    }

    /// Replication factor clamped to the number of nodes actually
    /// configured, matching the original's `min(R, numStorageNodes)`.
    pub fn effective_replication_factor(&self) -> u32 {
        self.replication_factor.min(self.num_storage_nodes())
    }
}
