//! The transient block record exchanged between master and storage node, and
//! its self-delimiting wire encoding.

use crate::errors::WireError;

/// Default bound on key length in bytes. Storage nodes may be configured with
/// a different `keyLengthMax`; this is only the cluster-wide convention.
pub const DEFAULT_KEY_MAX: usize = 50;

/// A unit of a client payload in transit between master and storage node.
///
/// Blocks are created when decoding a request payload or reading from disk,
/// and dropped when the enclosing request finishes — they are never kept
/// around between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub key: String,
    pub block_num: u32,
    pub data: Vec<u8>,
}

impl Block {
    pub fn new(key: impl Into<String>, block_num: u32, data: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            block_num,
            data,
        }
    }

    pub fn data_size(&self) -> u32 {
        self.data.len() as u32
    }

    /// Splits `data` into ascending-`block_num` blocks of at most
    /// `data_block_size` bytes each, all tagged with `key`. The final block
    /// may be shorter than `data_block_size`.
    pub fn split_payload(key: &str, data: &[u8], data_block_size: u32) -> Vec<Block> {
        assert!(data_block_size > 0, "data_block_size must be positive");
        if data.is_empty() {
            return Vec::new();
        }
        data.chunks(data_block_size as usize)
            .enumerate()
            .map(|(i, chunk)| Block::new(key, i as u32, chunk.to_vec()))
            .collect()
    }

    /// Appends this block's wire encoding to `buffer`:
    /// `keyLen:u32_le | key | blockNum:u32_le | dataSize:u32_le | data`.
    pub fn serialize(&self, buffer: &mut Vec<u8>) {
        let key_bytes = self.key.as_bytes();
        buffer.extend_from_slice(&(key_bytes.len() as u32).to_le_bytes());
        buffer.extend_from_slice(key_bytes);
        buffer.extend_from_slice(&self.block_num.to_le_bytes());
        buffer.extend_from_slice(&self.data_size().to_le_bytes());
        buffer.extend_from_slice(&self.data);
    }

    /// Serializes a concatenation of blocks in one pass.
    pub fn serialize_all(blocks: &[Block]) -> Vec<u8> {
        let mut buffer = Vec::new();
        for block in blocks {
            block.serialize(&mut buffer);
        }
        buffer
    }

    /// Decodes a concatenation of block records, walking the buffer to
    /// completion. Fails if the buffer ends mid-record.
    pub fn deserialize_all(buffer: &[u8]) -> Result<Vec<Block>, WireError> {
        let mut blocks = Vec::new();
        let mut cursor = 0usize;

        while cursor < buffer.len() {
            let key_len = read_u32(buffer, cursor)? as usize;
            cursor += 4;

            let key_bytes = take(buffer, cursor, key_len)?;
            cursor += key_len;
            let key = String::from_utf8(key_bytes.to_vec())
                .map_err(|_| WireError::InvalidUtf8 { field: "key" })?;

            let block_num = read_u32(buffer, cursor)?;
            cursor += 4;

            let data_size = read_u32(buffer, cursor)? as usize;
            cursor += 4;

            let data = take(buffer, cursor, data_size)?.to_vec();
            cursor += data_size;

            blocks.push(Block::new(key, block_num, data));
        }

        Ok(blocks)
    }
}

fn read_u32(buffer: &[u8], at: usize) -> Result<u32, WireError> {
    let slice = take(buffer, at, 4)?;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

fn take(buffer: &[u8], at: usize, len: usize) -> Result<&[u8], WireError> {
    buffer.get(at..at + len).ok_or(WireError::Truncated {
        expected: len,
        found: buffer.len().saturating_sub(at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_single_block() {
        let block = Block::new("archive.zip", 0, vec![1, 2, 3, 4]);
        let encoded = Block::serialize_all(&[block.clone()]);
        let decoded = Block::deserialize_all(&encoded).unwrap();
        assert_eq!(decoded, vec![block]);
    }

    #[test]
    fn round_trips_multiple_blocks_in_order() {
        let blocks = vec![
            Block::new("archive.zip", 0, vec![0xAA; 40]),
            Block::new("archive.zip", 1, vec![0xBB; 40]),
            Block::new("archive.zip", 2, vec![0xCC; 10]),
        ];
        let encoded = Block::serialize_all(&blocks);
        let decoded = Block::deserialize_all(&encoded).unwrap();
        assert_eq!(decoded, blocks);
    }

    #[test]
    fn split_payload_chunks_with_short_last_block() {
        let data = vec![0u8; 90];
        let blocks = Block::split_payload("archive.zip", &data, 40);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].data.len(), 40);
        assert_eq!(blocks[1].data.len(), 40);
        assert_eq!(blocks[2].data.len(), 10);
        assert_eq!(blocks[2].block_num, 2);
    }

    #[test]
    fn split_empty_payload_yields_no_blocks() {
        assert!(Block::split_payload("k", &[], 40).is_empty());
    }

    #[test]
    fn deserialize_truncated_buffer_fails() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&5u32.to_le_bytes());
        buf.extend_from_slice(b"ab"); // declared 5 bytes of key, only 2 present
        assert!(Block::deserialize_all(&buf).is_err());
    }
}
