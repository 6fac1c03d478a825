//! Storage-node configuration. Plain value struct, no file-format parsing —
//! a binary builds one from environment variables and defaults.

use rk_storage::StorageEngineConfig;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub store_dir_path: String,
    pub store_file_prefix: String,
    pub disk_block_size: u32,
    pub max_data_size_power: u32,
    pub remove_existing_store_file: bool,
    pub data_block_size: u32,
    pub key_length_max: usize,
    pub bind_addr: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_dir_path: "./data".to_string(),
            store_file_prefix: "rackkey_store_".to_string(),
            disk_block_size: 4096,
            max_data_size_power: 30, // 1 GiB
            remove_existing_store_file: false,
            data_block_size: 4096,
            key_length_max: rk_types::DEFAULT_KEY_MAX,
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn with_store_dir_path(mut self, path: impl Into<String>) -> Self {
        self.store_dir_path = path.into();
        self
    }

    pub fn with_store_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.store_file_prefix = prefix.into();
        self
    }

    pub fn with_disk_block_size(mut self, size: u32) -> Self {
        self.disk_block_size = size;
        self
    }

    pub fn with_max_data_size_power(mut self, power: u32) -> Self {
        self.max_data_size_power = power;
        self
    }

    pub fn with_remove_existing_store_file(mut self, remove: bool) -> Self {
        self.remove_existing_store_file = remove;
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

    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn max_data_size(&self) -> u32 {
        1u32 << self.max_data_size_power
    }

    /// `${prefix}${node_id}`, the on-disk store file name this node owns.
    pub fn store_file_name(&self, node_id: u32) -> String {
        format!("{}{}", self.store_file_prefix, node_id)
    }

    pub fn engine_config(&self) -> StorageEngineConfig {
        StorageEngineConfig::default()
            .with_disk_block_size(self.disk_block_size)
            .with_max_data_size(self.max_data_size())
            .with_key_len_max(self.key_length_max)
            .with_remove_existing(self.remove_existing_store_file)
    }
}
