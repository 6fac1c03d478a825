//! The Block Allocation Table: the on-disk index from key to the contiguous
//! run of disk blocks holding that key's data.

use rk_crypto::sha256_32;
use rk_types::normalize_key;

/// Byte size of `numEntries` field at the start of the BAT region.
pub const NUM_ENTRIES_FIELD_SIZE: usize = 4;

/// One entry in the [`Bat`]: where a key's data lives and how big it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatEntry {
    /// Full key, kept so a 32-bit hash collision between distinct keys can
    /// be detected and rejected rather than silently overwriting.
    pub key: String,
    pub key_hash: u32,
    pub starting_disk_block_num: u32,
    pub num_bytes: u32,
}

impl BatEntry {
    pub fn new(key: String, starting_disk_block_num: u32, num_bytes: u32) -> Self {
        let key_hash = sha256_32(key.as_bytes());
        Self {
            key,
            key_hash,
            starting_disk_block_num,
            num_bytes,
        }
    }

    pub fn wire_size(key_max: usize) -> usize {
        key_max + 4 + 4 + 4
    }

    pub fn to_bytes(&self, key_max: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::wire_size(key_max));
        buf.extend_from_slice(&normalize_key(&self.key, key_max));
        buf.extend_from_slice(&self.key_hash.to_le_bytes());
        buf.extend_from_slice(&self.starting_disk_block_num.to_le_bytes());
        buf.extend_from_slice(&self.num_bytes.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8], key_max: usize) -> Self {
        let key_bytes = &buf[0..key_max];
        let key_end = key_bytes.iter().position(|&b| b == 0).unwrap_or(key_max);
        let key = String::from_utf8_lossy(&key_bytes[..key_end]).into_owned();

        let key_hash = u32::from_le_bytes(buf[key_max..key_max + 4].try_into().unwrap());
        let starting_disk_block_num =
            u32::from_le_bytes(buf[key_max + 4..key_max + 8].try_into().unwrap());
        let num_bytes = u32::from_le_bytes(buf[key_max + 8..key_max + 12].try_into().unwrap());

        Self {
            key,
            key_hash,
            starting_disk_block_num,
            num_bytes,
        }
    }

    /// Disk blocks spanned by this entry's run.
    pub fn num_disk_blocks(&self, disk_block_size: u32) -> u32 {
        crate::header::num_disk_blocks(self.num_bytes, disk_block_size)
    }
}

/// In-memory mirror of the on-disk Block Allocation Table.
///
/// Entries are unordered but hash-unique: at most one entry per `key_hash`.
#[derive(Debug, Clone, Default)]
pub struct Bat {
    entries: Vec<BatEntry>,
}

impl Bat {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn num_entries(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn entries(&self) -> &[BatEntry] {
        &self.entries
    }

    pub fn find_by_hash(&self, key_hash: u32) -> Option<&BatEntry> {
        self.entries.iter().find(|e| e.key_hash == key_hash)
    }

    fn find_index_by_hash(&self, key_hash: u32) -> Option<usize> {
        self.entries.iter().position(|e| e.key_hash == key_hash)
    }

    /// Inserts a new entry or overwrites the existing one with the same
    /// hash, in place (preserving its slot). Returns the entry it replaced,
    /// if any.
    pub fn upsert(&mut self, entry: BatEntry) -> Option<BatEntry> {
        if let Some(idx) = self.find_index_by_hash(entry.key_hash) {
            Some(std::mem::replace(&mut self.entries[idx], entry))
        } else {
            self.entries.push(entry);
            None
        }
    }

    pub fn remove_by_hash(&mut self, key_hash: u32) -> Option<BatEntry> {
        let idx = self.find_index_by_hash(key_hash)?;
        Some(self.entries.remove(idx))
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key.clone()).collect()
    }

    /// Serializes as `numEntries:u32` followed by each entry, in the
    /// kept-not-sorted order entries happen to be stored in.
    pub fn to_bytes(&self, key_max: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            NUM_ENTRIES_FIELD_SIZE + self.entries.len() * BatEntry::wire_size(key_max),
        );
        buf.extend_from_slice(&self.num_entries().to_le_bytes());
        for entry in &self.entries {
            buf.extend_from_slice(&entry.to_bytes(key_max));
        }
        buf
    }

    pub fn from_bytes(buf: &[u8], key_max: usize) -> Self {
        let num_entries = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        let entry_size = BatEntry::wire_size(key_max);
        let mut entries = Vec::with_capacity(num_entries);
        for i in 0..num_entries {
            let start = NUM_ENTRIES_FIELD_SIZE + i * entry_size;
            entries.push(BatEntry::from_bytes(&buf[start..start + entry_size], key_max));
        }
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_round_trips_through_bytes() {
        let entry = BatEntry::new("archive.zip".to_string(), 3, 90);
        let bytes = entry.to_bytes(50);
        assert_eq!(bytes.len(), BatEntry::wire_size(50));
        assert_eq!(BatEntry::from_bytes(&bytes, 50), entry);
    }

    #[test]
    fn upsert_replaces_same_hash_in_place() {
        let mut bat = Bat::new();
        bat.upsert(BatEntry::new("archive.zip".to_string(), 0, 90));
        assert_eq!(bat.num_entries(), 1);

        let replaced = bat.upsert(BatEntry::new("archive.zip".to_string(), 5, 30));
        assert_eq!(bat.num_entries(), 1);
        assert_eq!(replaced.unwrap().starting_disk_block_num, 0);
        assert_eq!(bat.find_by_hash(sha256_32(b"archive.zip")).unwrap().num_bytes, 30);
    }

    #[test]
    fn remove_by_hash_drops_entry() {
        let mut bat = Bat::new();
        bat.upsert(BatEntry::new("archive.zip".to_string(), 0, 90));
        let hash = sha256_32(b"archive.zip");
        assert!(bat.remove_by_hash(hash).is_some());
        assert!(bat.find_by_hash(hash).is_none());
        assert_eq!(bat.num_entries(), 0);
    }

    #[test]
    fn bat_round_trips_through_bytes() {
        let mut bat = Bat::new();
        bat.upsert(BatEntry::new("archive.zip".to_string(), 0, 90));
        bat.upsert(BatEntry::new("other.bin".to_string(), 5, 30));

        let bytes = bat.to_bytes(50);
        let decoded = Bat::from_bytes(&bytes, 50);
        assert_eq!(decoded.num_entries(), 2);
        assert_eq!(decoded.find_by_hash(sha256_32(b"archive.zip")).unwrap().num_bytes, 90);
        assert_eq!(decoded.find_by_hash(sha256_32(b"other.bin")).unwrap().num_bytes, 30);
    }
}
