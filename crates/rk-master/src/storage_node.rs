//! The master's view of one storage node: where it lives, whether the last
//! health check succeeded, and how full it last reported itself to be.

/// Usage statistics last reported by a storage node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageNodeStats {
    pub blocks_stored: u32,
    pub data_bytes_used: u32,
    pub data_bytes_free: u32,
    pub data_bytes_total: u32,
}

impl StorageNodeStats {
    pub fn apply_size_info(&mut self, data_used_size: u32, data_total_size: u32) {
        self.data_bytes_used = data_used_size;
        self.data_bytes_total = data_total_size;
        self.data_bytes_free = data_total_size.saturating_sub(data_used_size);
    }
}

#[derive(Debug, Clone)]
pub struct StorageNode {
    pub id: u32,
    pub ip_port: String,
    pub is_healthy: bool,
    pub stats: StorageNodeStats,
}

impl StorageNode {
    pub fn new(id: u32, ip_port: impl Into<String>) -> Self {
        Self {
            id,
            ip_port: ip_port.into(),
            // Assumed healthy until the first health check says otherwise,
            // so a fresh cluster can take traffic before its first tick.
            is_healthy: true,
            stats: StorageNodeStats::default(),
        }
    }

    pub fn base_url(&self) -> String {
        if self.ip_port.starts_with("http://") || self.ip_port.starts_with("https://") {
            self.ip_port.clone()
        } else {
            format!("http://{}", self.ip_port)
        }
    }
}
