/// Parameters fixed at store-file creation time.
///
/// None of these are read from a config file; callers build one with
/// `with_*` setters the way the rest of the fleet configures itself.
#[derive(Debug, Clone)]
pub struct StorageEngineConfig {
    /// Size in bytes of one disk block, the store's allocation unit.
    pub disk_block_size: u32,
    /// Total data-section capacity in bytes, fixed for the file's lifetime.
    pub max_data_size: u32,
    /// Max key length in bytes; keys are null-padded to this width on disk.
    pub key_len_max: usize,
    /// If true, an existing store file at the target path is deleted and
    /// recreated instead of reloaded.
    pub remove_existing: bool,
}

impl Default for StorageEngineConfig {
    fn default() -> Self {
        Self {
            disk_block_size: 4096,
            max_data_size: 4096 * 1024 * 256, // 1 GiB of data blocks
            key_len_max: rk_types::DEFAULT_KEY_MAX,
            remove_existing: false,
        }
    }
}

impl StorageEngineConfig {
    pub fn with_disk_block_size(mut self, size: u32) -> Self {
        self.disk_block_size = size;
        self
    }

    pub fn with_max_data_size(mut self, size: u32) -> Self {
        self.max_data_size = size;
        self
    }

    pub fn with_key_len_max(mut self, len: usize) -> Self {
        self.key_len_max = len;
        self
    }

    pub fn with_remove_existing(mut self, remove_existing: bool) -> Self {
        self.remove_existing = remove_existing;
        self
    }
}
