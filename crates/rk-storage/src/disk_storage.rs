//! The on-disk block store: a single file holding a [`Header`], a [`Bat`],
//! and a flat data section addressed in fixed-size disk blocks.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use rk_crypto::sha256_32;
use rk_types::Block;

use crate::bat::{Bat, BatEntry};
use crate::config::StorageEngineConfig;
use crate::errors::StorageError;
use crate::free_space::FreeSpaceMap;
use crate::header::{num_disk_blocks, Header, HEADER_SIZE};

/// A single-file block store, keyed by content hash, used by one storage
/// node to hold its share of the fleet's blocks.
#[derive(Debug)]
pub struct DiskStorage {
    store_file_path: PathBuf,
    header: Header,
    bat: Bat,
    free_space_map: FreeSpaceMap,
    key_len_max: usize,
}

impl DiskStorage {
    /// Opens the store file at `store_dir_path`/`store_file_name`, creating
    /// it if it doesn't exist or `config.remove_existing` is set.
    pub async fn open(
        store_dir_path: impl AsRef<Path>,
        store_file_name: &str,
        config: StorageEngineConfig,
    ) -> Result<Self, StorageError> {
        let store_dir_path = store_dir_path.as_ref();
        let store_file_path = store_dir_path.join(store_file_name);

        if config.remove_existing && store_dir_path.exists() {
            fs::remove_dir_all(store_dir_path).await?;
        }

        if store_file_path.exists() {
            Self::reload(store_file_path, config.key_len_max).await
        } else {
            Self::create(store_dir_path, store_file_path, config).await
        }
    }

    async fn create(
        store_dir_path: &Path,
        store_file_path: PathBuf,
        config: StorageEngineConfig,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(store_dir_path).await?;

        let num_blocks = num_disk_blocks(config.max_data_size, config.disk_block_size);
        let bat_entry_size = BatEntry::wire_size(config.key_len_max) as u32;
        let bat_size = 4 + num_blocks * bat_entry_size;
        let header = Header::new(config.disk_block_size, config.max_data_size, bat_size);

        let total_file_size = HEADER_SIZE as u64 + header.bat_size as u64 + header.max_data_size as u64;

        let mut file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&store_file_path)
            .await?;

        if total_file_size > 0 {
            file.seek(std::io::SeekFrom::Start(total_file_size - 1)).await?;
            file.write_all(&[0u8]).await?;
            file.flush().await?;
        }

        file.seek(std::io::SeekFrom::Start(0)).await?;
        file.write_all(&header.to_bytes()).await?;
        file.flush().await?;

        info!(path = %store_file_path.display(), "created new store file");

        Ok(Self {
            store_file_path,
            header,
            bat: Bat::new(),
            free_space_map: FreeSpaceMap::new(num_blocks),
            key_len_max: config.key_len_max,
        })
    }

    async fn reload(store_file_path: PathBuf, key_len_max: usize) -> Result<Self, StorageError> {
        let mut file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&store_file_path)
            .await?;

        let mut header_buf = [0u8; HEADER_SIZE];
        file.seek(std::io::SeekFrom::Start(0)).await?;
        file.read_exact(&mut header_buf).await?;
        let header = Header::from_bytes(&header_buf);
        if !header.is_valid() {
            return Err(StorageError::InvalidMagicNumber);
        }

        let mut bat_buf = vec![0u8; header.bat_size as usize];
        file.seek(std::io::SeekFrom::Start(header.bat_offset as u64)).await?;
        file.read_exact(&mut bat_buf).await?;
        let bat = Bat::from_bytes(&bat_buf, key_len_max);

        let num_blocks = num_disk_blocks(header.max_data_size, header.disk_block_size);
        let mut free_space_map = FreeSpaceMap::new(num_blocks);
        for entry in bat.entries() {
            let n = entry.num_disk_blocks(header.disk_block_size);
            free_space_map.allocate_n_blocks(entry.starting_disk_block_num, n);
        }

        info!(
            path = %store_file_path.display(),
            num_entries = bat.num_entries(),
            "reloaded existing store file"
        );

        Ok(Self {
            store_file_path,
            header,
            bat,
            free_space_map,
            key_len_max,
        })
    }

    fn disk_block_offset(&self, disk_block_num: u32) -> u64 {
        self.header.block_store_offset as u64
            + (self.header.disk_block_size as u64 * disk_block_num as u64)
    }

    fn num_disk_blocks(&self, num_data_bytes: u32) -> u32 {
        num_disk_blocks(num_data_bytes, self.header.disk_block_size)
    }

    async fn open_file(&self) -> Result<fs::File, StorageError> {
        Ok(fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.store_file_path)
            .await?)
    }

    async fn write_bat(&self) -> Result<(), StorageError> {
        let mut file = self.open_file().await?;
        file.seek(std::io::SeekFrom::Start(self.header.bat_offset as u64)).await?;
        file.write_all(&self.bat.to_bytes(self.key_len_max)).await?;
        file.flush().await?;
        Ok(())
    }

    /// Reads back the subset of `key`'s blocks named in `requested_block_nums`.
    ///
    /// `data_block_size` must match the size the caller originally wrote
    /// with — on-disk blocks carry no length prefix, so the read path has
    /// no way to recover it otherwise (see [`decode_disk_blocks`]).
    pub async fn read_blocks(
        &self,
        key: &str,
        requested_block_nums: &HashSet<u32>,
        data_block_size: u32,
    ) -> Result<Vec<Block>, StorageError> {
        let entry = self.find_entry(key)?;

        let offset = self.disk_block_offset(entry.starting_disk_block_num);
        let total_num_bytes = entry.num_bytes as usize;

        let mut read_buffer = vec![0u8; total_num_bytes];
        let mut file = self.open_file().await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        file.read_exact(&mut read_buffer).await?;

        let all_blocks = decode_disk_blocks(&read_buffer, data_block_size)?;
        let blocks: Vec<Block> = all_blocks
            .into_iter()
            .filter(|(block_num, _)| requested_block_nums.contains(block_num))
            .map(|(block_num, data)| Block::new(key, block_num, data))
            .collect();

        if blocks.len() != requested_block_nums.len() {
            return Err(StorageError::Malformed {
                reason: format!(
                    "requested {} blocks for key {key} but found {}",
                    requested_block_nums.len(),
                    blocks.len()
                ),
            });
        }

        Ok(blocks)
    }

    /// Reads back every block currently stored for `key`.
    pub async fn read_all_blocks(&self, key: &str, data_block_size: u32) -> Result<Vec<Block>, StorageError> {
        let all_nums: HashSet<u32> =
            self.get_block_nums(key, data_block_size).await?.into_iter().collect();
        self.read_blocks(key, &all_nums, data_block_size).await
    }

    /// Writes `data_blocks` under `key`, overwriting any existing entry.
    pub async fn write_blocks(&mut self, key: &str, data_blocks: &[Block]) -> Result<(), StorageError> {
        if data_blocks.is_empty() {
            return Err(StorageError::Malformed {
                reason: "writeBlocks() called with no data blocks".to_string(),
            });
        }
        if key.len() > self.key_len_max {
            return Err(StorageError::KeyTooLong {
                len: key.len(),
                max: self.key_len_max,
            });
        }

        let key_hash = sha256_32(key.as_bytes());
        if let Some(existing) = self.bat.find_by_hash(key_hash) {
            if existing.key != key {
                return Err(StorageError::HashCollision {
                    existing: existing.key.clone(),
                    incoming: key.to_string(),
                });
            }
        }

        let existing_allocation = self
            .bat
            .find_by_hash(key_hash)
            .map(|e| (e.starting_disk_block_num, self.num_disk_blocks(e.num_bytes)));

        if let Some((start, n)) = existing_allocation {
            self.free_space_map.free_n_blocks(start, n);
        }

        let buffer = encode_disk_blocks(data_blocks);
        let num_total_bytes = buffer.len() as u32;
        let n = self.num_disk_blocks(num_total_bytes);

        let alloc = self.free_space_map.find_n_free_blocks(n);
        let starting_disk_block_num = match alloc {
            Some(start) => start,
            None => {
                if let Some((start, n)) = existing_allocation {
                    self.free_space_map.allocate_n_blocks(start, n);
                }
                return Err(StorageError::OutOfSpace {
                    needed: n,
                    available: self.free_space_map.block_capacity(),
                });
            }
        };

        let offset = self.disk_block_offset(starting_disk_block_num);
        let write_result = async {
            let mut file = self.open_file().await?;
            file.seek(std::io::SeekFrom::Start(offset)).await?;
            file.write_all(&buffer).await?;
            file.flush().await?;
            Ok::<(), StorageError>(())
        }
        .await;

        if let Err(err) = write_result {
            if let Some((start, n)) = existing_allocation {
                self.free_space_map.allocate_n_blocks(start, n);
            }
            return Err(err);
        }

        self.free_space_map.allocate_n_blocks(starting_disk_block_num, n);
        self.bat.upsert(BatEntry::new(
            key.to_string(),
            starting_disk_block_num,
            num_total_bytes,
        ));

        self.write_bat().await?;
        debug!(key, blocks = data_blocks.len(), "wrote blocks");
        Ok(())
    }

    /// Frees `key`'s blocks and drops its BAT entry.
    pub async fn delete_blocks(&mut self, key: &str) -> Result<(), StorageError> {
        let key_hash = sha256_32(key.as_bytes());
        let entry = self
            .bat
            .find_by_hash(key_hash)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { key: key.to_string() })?;

        let n = self.num_disk_blocks(entry.num_bytes);
        self.free_space_map.free_n_blocks(entry.starting_disk_block_num, n);
        self.bat.remove_by_hash(key_hash);
        self.write_bat().await?;
        Ok(())
    }

    pub fn get_keys(&self) -> Vec<String> {
        self.bat.keys()
    }

    /// Block numbers stored for `key`: by the dense-from-zero invariant on
    /// `blockNum`, the count alone (derived from the entry's byte size and
    /// the per-block `blockNum` prefix) is enough to enumerate them.
    pub async fn get_block_nums(&self, key: &str, data_block_size: u32) -> Result<Vec<u32>, StorageError> {
        let entry = self.find_entry(key)?;
        let count = (entry.num_bytes as u64).div_ceil(data_block_size as u64 + 4) as u32;
        Ok((0..count).collect())
    }

    fn find_entry(&self, key: &str) -> Result<&BatEntry, StorageError> {
        let key_hash = sha256_32(key.as_bytes());
        self.bat
            .find_by_hash(key_hash)
            .filter(|e| e.key == key)
            .ok_or_else(|| StorageError::NotFound { key: key.to_string() })
    }

    /// Bytes currently occupied in the data section.
    pub fn data_used_size(&self) -> u32 {
        self.bat
            .entries()
            .iter()
            .map(|e| self.num_disk_blocks(e.num_bytes) * self.header.disk_block_size)
            .sum()
    }

    /// Total capacity of the data section, in bytes.
    pub fn data_total_size(&self) -> u32 {
        self.header.max_data_size
    }

    pub fn total_file_size(&self) -> u64 {
        HEADER_SIZE as u64 + self.header.bat_size as u64 + self.header.max_data_size as u64
    }

    #[cfg(test)]
    fn free_space_map(&self) -> &FreeSpaceMap {
        &self.free_space_map
    }

    #[cfg(test)]
    fn bat(&self) -> &Bat {
        &self.bat
    }
}

impl Drop for DiskStorage {
    fn drop(&mut self) {
        warn!(path = %self.store_file_path.display(), "dropping DiskStorage handle");
    }
}

/// Concatenates `blockNum:u32_le | data` for each block, in the order given.
/// Unlike the wire encoding, the key and a per-block length are omitted: the
/// key lives in the BAT entry, and every block but the last is exactly
/// `data_block_size` bytes, so the reader can derive sizes from `numBytes`.
fn encode_disk_blocks(blocks: &[Block]) -> Vec<u8> {
    let mut buffer = Vec::new();
    for block in blocks {
        buffer.extend_from_slice(&block.block_num.to_le_bytes());
        buffer.extend_from_slice(&block.data);
    }
    buffer
}

/// Inverse of [`encode_disk_blocks`]. Every block's data is assumed to be
/// `data_block_size` bytes except the last, whose size is whatever remains
/// in `buffer`.
fn decode_disk_blocks(buffer: &[u8], data_block_size: u32) -> Result<Vec<(u32, Vec<u8>)>, StorageError> {
    let data_block_size = data_block_size as usize;
    let mut blocks = Vec::new();
    let mut cursor = 0usize;

    while cursor < buffer.len() {
        let block_num_bytes = buffer.get(cursor..cursor + 4).ok_or(StorageError::Malformed {
            reason: "disk record truncated mid block-number".to_string(),
        })?;
        let block_num = u32::from_le_bytes(block_num_bytes.try_into().unwrap());
        cursor += 4;

        let remaining = buffer.len() - cursor;
        let data_size = data_block_size.min(remaining);
        let data = buffer[cursor..cursor + data_size].to_vec();
        cursor += data_size;

        blocks.push((block_num, data));
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn blocks_for(key: &str, data_block_size: u32, payload: &[u8]) -> Vec<Block> {
        Block::split_payload(key, payload, data_block_size)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let mut ds = DiskStorage::open(
            dir.path(),
            "store",
            StorageEngineConfig::default().with_disk_block_size(20),
        )
        .await
        .unwrap();

        let payload = vec![7u8; 90];
        let blocks = blocks_for("archive.zip", 40, &payload);
        ds.write_blocks("archive.zip", &blocks).await.unwrap();

        let nums: HashSet<u32> = blocks.iter().map(|b| b.block_num).collect();
        let read_back = ds.read_blocks("archive.zip", &nums, 40).await.unwrap();
        assert_eq!(read_back.len(), blocks.len());
        for b in &read_back {
            let original = blocks.iter().find(|o| o.block_num == b.block_num).unwrap();
            assert_eq!(&b.data, &original.data);
        }
    }

    #[tokio::test]
    async fn overwrite_existing_key_reclaims_old_blocks() {
        let dir = tempdir().unwrap();
        let mut ds = DiskStorage::open(
            dir.path(),
            "store",
            StorageEngineConfig::default().with_disk_block_size(20),
        )
        .await
        .unwrap();

        let big = blocks_for("archive.zip", 40, &vec![1u8; 200]);
        ds.write_blocks("archive.zip", &big).await.unwrap();
        let used_after_big = ds.data_used_size();

        let small = blocks_for("archive.zip", 40, &vec![2u8; 40]);
        ds.write_blocks("archive.zip", &small).await.unwrap();
        let used_after_small = ds.data_used_size();

        assert_eq!(ds.bat().num_entries(), 1);
        assert!(used_after_small < used_after_big);
    }

    #[tokio::test]
    async fn delete_frees_blocks_and_drops_entry() {
        let dir = tempdir().unwrap();
        let mut ds = DiskStorage::open(
            dir.path(),
            "store",
            StorageEngineConfig::default().with_disk_block_size(20),
        )
        .await
        .unwrap();

        let blocks = blocks_for("archive.zip", 40, &vec![9u8; 80]);
        ds.write_blocks("archive.zip", &blocks).await.unwrap();
        assert!(ds.free_space_map().is_mapped(0));

        ds.delete_blocks("archive.zip").await.unwrap();
        assert!(!ds.free_space_map().is_mapped(0));
        assert_eq!(ds.get_keys().len(), 0);
    }

    #[tokio::test]
    async fn fragmented_write_skips_freed_hole() {
        let dir = tempdir().unwrap();
        let mut ds = DiskStorage::open(
            dir.path(),
            "store",
            StorageEngineConfig::default().with_disk_block_size(20),
        )
        .await
        .unwrap();

        let key1_blocks = blocks_for("key1", 40, &vec![1u8; 120]);
        ds.write_blocks("key1", &key1_blocks).await.unwrap();

        let key2_blocks = blocks_for("key2", 40, &vec![2u8; 200]);
        ds.write_blocks("key2", &key2_blocks).await.unwrap();

        ds.delete_blocks("key1").await.unwrap();

        let key3_blocks = blocks_for("key3", 40, &vec![3u8; 160]);
        ds.write_blocks("key3", &key3_blocks).await.unwrap();

        // key3 should not have reused key1's freed hole at block 0, since
        // the hole is smaller than key3 needs once key2 occupies the middle.
        let entry = ds.find_entry("key3").unwrap();
        assert!(entry.starting_disk_block_num > 0);
    }

    #[tokio::test]
    async fn restarting_rebuilds_state_from_disk() {
        let dir = tempdir().unwrap();
        let config = StorageEngineConfig::default().with_disk_block_size(20);

        {
            let mut ds = DiskStorage::open(dir.path(), "store", config.clone()).await.unwrap();
            let blocks = blocks_for("archive.zip", 40, &vec![5u8; 90]);
            ds.write_blocks("archive.zip", &blocks).await.unwrap();
        }

        let reloaded = DiskStorage::open(dir.path(), "store", config).await.unwrap();
        assert_eq!(reloaded.get_keys(), vec!["archive.zip".to_string()]);
        assert!(reloaded.free_space_map().is_mapped(0));
    }

    #[tokio::test]
    async fn out_of_space_write_restores_prior_allocation() {
        let dir = tempdir().unwrap();
        let mut ds = DiskStorage::open(
            dir.path(),
            "store",
            StorageEngineConfig::default()
                .with_disk_block_size(4096)
                .with_max_data_size(1 << 16),
        )
        .await
        .unwrap();

        let key = "archive.zip";
        let first = blocks_for(key, 4092, &vec![1u8; 4092 * 10]);
        ds.write_blocks(key, &first).await.unwrap();
        let used_before = ds.data_used_size();

        let huge = blocks_for("video.mp4", 4092, &vec![2u8; 4092 * 1000]);
        let err = ds.write_blocks("video.mp4", &huge).await;
        assert!(err.is_err());
        assert_eq!(ds.data_used_size(), used_before);
        assert_eq!(ds.get_keys(), vec![key.to_string()]);
    }

    #[tokio::test]
    async fn missing_key_reads_and_deletes_return_not_found() {
        let dir = tempdir().unwrap();
        let ds = DiskStorage::open(
            dir.path(),
            "store",
            StorageEngineConfig::default().with_disk_block_size(20),
        )
        .await
        .unwrap();

        let err = ds.read_blocks("ghost", &HashSet::new(), 40).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}
