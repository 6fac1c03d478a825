//! Domain types and wire encodings shared by the master and storage-node
//! binaries: the transient [`Block`] record and the small
//! [`BlockNumList`]/[`SizeInfo`]/[`SyncInfo`] payloads exchanged alongside it.

pub mod block;
pub mod errors;
pub mod payloads;

pub use block::{Block, DEFAULT_KEY_MAX};
pub use errors::WireError;
pub use payloads::{normalize_key, normalize_key_default, BlockNumList, SizeInfo, SyncInfo};
