//! Wire encodings for the small request/response payloads exchanged on the
//! master↔storage path that are not a block list: which block numbers are
//! wanted, how full a node is, and what a node holds at sync time.

use crate::block::DEFAULT_KEY_MAX;
use crate::errors::WireError;
use std::collections::BTreeMap;

/// A flat list of requested block numbers: `blockNum:u32` repeated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockNumList {
    pub block_nums: Vec<u32>,
}

impl BlockNumList {
    pub fn new(block_nums: Vec<u32>) -> Self {
        Self { block_nums }
    }

    pub fn serialize(&self, buffer: &mut Vec<u8>) {
        for n in &self.block_nums {
            buffer.extend_from_slice(&n.to_le_bytes());
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.block_nums.len() * 4);
        self.serialize(&mut buffer);
        buffer
    }

    pub fn deserialize(buffer: &[u8]) -> Result<Self, WireError> {
        if buffer.len() % 4 != 0 {
            return Err(WireError::Truncated {
                expected: 4 - (buffer.len() % 4),
                found: 0,
            });
        }
        let block_nums = buffer
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        Ok(Self { block_nums })
    }
}

/// A storage node's data-section usage, reported after every mutating op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeInfo {
    pub data_used_size: u32,
    pub data_total_size: u32,
}

impl SizeInfo {
    pub const WIRE_SIZE: usize = 8;

    pub fn new(data_used_size: u32, data_total_size: u32) -> Self {
        Self {
            data_used_size,
            data_total_size,
        }
    }

    pub fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.data_used_size.to_le_bytes());
        buffer.extend_from_slice(&self.data_total_size.to_le_bytes());
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(Self::WIRE_SIZE);
        self.serialize(&mut buffer);
        buffer
    }

    pub fn deserialize(buffer: &[u8]) -> Result<Self, WireError> {
        let (value, _) = Self::deserialize_at(buffer, 0)?;
        Ok(value)
    }

    /// Decodes one `SizeInfo` starting at `offset`, returning it and the
    /// offset just past it. Used by `SyncInfo`, whose payload is a
    /// `SizeInfo` trailing a variable-length section.
    pub fn deserialize_at(buffer: &[u8], offset: usize) -> Result<(Self, usize), WireError> {
        let slice = buffer.get(offset..offset + Self::WIRE_SIZE).ok_or(WireError::Truncated {
            expected: Self::WIRE_SIZE,
            found: buffer.len().saturating_sub(offset),
        })?;
        let data_used_size = u32::from_le_bytes(slice[0..4].try_into().unwrap());
        let data_total_size = u32::from_le_bytes(slice[4..8].try_into().unwrap());
        Ok((
            Self {
                data_used_size,
                data_total_size,
            },
            offset + Self::WIRE_SIZE,
        ))
    }
}

/// A storage node's reply to `GET /sync`: every key it holds, the block
/// numbers it has for each, and its current size info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncInfo {
    pub key_block_nums: BTreeMap<String, Vec<u32>>,
    pub size_info: SizeInfo,
}

impl SyncInfo {
    pub fn new(key_block_nums: BTreeMap<String, Vec<u32>>, size_info: SizeInfo) -> Self {
        Self {
            key_block_nums,
            size_info,
        }
    }

    /// Encodes as, for each key: `key:KEY_MAX bytes, null-padded | numBlocks:u32
    /// | blockNum:u32 × numBlocks`, followed by one `SizeInfo`.
    pub fn serialize(&self, key_max: usize, buffer: &mut Vec<u8>) {
        for (key, block_nums) in &self.key_block_nums {
            let mut fixed = vec![0u8; key_max];
            let key_bytes = key.as_bytes();
            let len = key_bytes.len().min(key_max);
            fixed[..len].copy_from_slice(&key_bytes[..len]);
            buffer.extend_from_slice(&fixed);

            buffer.extend_from_slice(&(block_nums.len() as u32).to_le_bytes());
            for n in block_nums {
                buffer.extend_from_slice(&n.to_le_bytes());
            }
        }
        self.size_info.serialize(buffer);
    }

    pub fn to_bytes(&self, key_max: usize) -> Vec<u8> {
        let mut buffer = Vec::new();
        self.serialize(key_max, &mut buffer);
        buffer
    }

    pub fn deserialize(buffer: &[u8], key_max: usize) -> Result<Self, WireError> {
        let mut cursor = 0usize;
        let mut key_block_nums = BTreeMap::new();

        // The trailing SizeInfo is fixed-width, so we know up front where
        // the variable-length key section ends.
        if buffer.len() < SizeInfo::WIRE_SIZE {
            return Err(WireError::Truncated {
                expected: SizeInfo::WIRE_SIZE,
                found: buffer.len(),
            });
        }
        let entries_end = buffer.len() - SizeInfo::WIRE_SIZE;

        while cursor < entries_end {
            let key_bytes = buffer.get(cursor..cursor + key_max).ok_or(WireError::Truncated {
                expected: key_max,
                found: entries_end.saturating_sub(cursor),
            })?;
            cursor += key_max;
            let key_end = key_bytes.iter().position(|&b| b == 0).unwrap_or(key_max);
            let key = String::from_utf8(key_bytes[..key_end].to_vec())
                .map_err(|_| WireError::InvalidUtf8 { field: "key" })?;

            let num_blocks_bytes = buffer.get(cursor..cursor + 4).ok_or(WireError::Truncated {
                expected: 4,
                found: entries_end.saturating_sub(cursor),
            })?;
            let num_blocks = u32::from_le_bytes(num_blocks_bytes.try_into().unwrap()) as usize;
            cursor += 4;

            let mut block_nums = Vec::with_capacity(num_blocks);
            for _ in 0..num_blocks {
                let bytes = buffer.get(cursor..cursor + 4).ok_or(WireError::Truncated {
                    expected: 4,
                    found: entries_end.saturating_sub(cursor),
                })?;
                block_nums.push(u32::from_le_bytes(bytes.try_into().unwrap()));
                cursor += 4;
            }

            key_block_nums.insert(key, block_nums);
        }

        let (size_info, _) = SizeInfo::deserialize_at(buffer, cursor)?;
        Ok(Self {
            key_block_nums,
            size_info,
        })
    }
}

impl Default for SyncInfo {
    fn default() -> Self {
        Self {
            key_block_nums: BTreeMap::new(),
            size_info: SizeInfo::new(0, 0),
        }
    }
}

/// Normalizes a wire key to the fixed-width, null-padded form the on-disk
/// BAT stores it in.
pub fn normalize_key(key: &str, key_max: usize) -> Vec<u8> {
    let mut fixed = vec![0u8; key_max];
    let key_bytes = key.as_bytes();
    let len = key_bytes.len().min(key_max);
    fixed[..len].copy_from_slice(&key_bytes[..len]);
    fixed
}

/// Default key-max convenience wrapper over [`normalize_key`].
pub fn normalize_key_default(key: &str) -> Vec<u8> {
    normalize_key(key, DEFAULT_KEY_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_num_list_round_trips() {
        let list = BlockNumList::new(vec![0, 1, 2, 100]);
        let bytes = list.to_bytes();
        assert_eq!(BlockNumList::deserialize(&bytes).unwrap(), list);
    }

    #[test]
    fn size_info_round_trips() {
        let info = SizeInfo::new(1024, 4096);
        let bytes = info.to_bytes();
        assert_eq!(bytes.len(), SizeInfo::WIRE_SIZE);
        assert_eq!(SizeInfo::deserialize(&bytes).unwrap(), info);
    }

    #[test]
    fn sync_info_round_trips() {
        let mut map = BTreeMap::new();
        map.insert("archive.zip".to_string(), vec![0, 1, 2]);
        map.insert("other.bin".to_string(), vec![0]);
        let sync = SyncInfo::new(map, SizeInfo::new(10, 20));

        let bytes = sync.to_bytes(50);
        let decoded = SyncInfo::deserialize(&bytes, 50).unwrap();
        assert_eq!(decoded, sync);
    }

    #[test]
    fn sync_info_empty_round_trips() {
        let sync = SyncInfo::default();
        let bytes = sync.to_bytes(50);
        let decoded = SyncInfo::deserialize(&bytes, 50).unwrap();
        assert_eq!(decoded, sync);
    }

    #[test]
    fn normalize_key_pads_and_truncates() {
        let padded = normalize_key("ab", 5);
        assert_eq!(padded, vec![b'a', b'b', 0, 0, 0]);

        let truncated = normalize_key("abcdef", 5);
        assert_eq!(truncated, b"abcde");
    }
}
