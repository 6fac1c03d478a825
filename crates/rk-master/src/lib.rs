//! The master binary's library half: cluster configuration, placement,
//! health tracking, and the HTTP façade that fans requests out to the
//! storage fleet.

pub mod config;
pub mod errors;
pub mod health;
pub mod server;
pub mod state;
pub mod stats;
pub mod storage_node;

pub use config::MasterConfig;
pub use errors::MasterError;
pub use server::MasterServer;
pub use state::MasterState;
pub use storage_node::{StorageNode, StorageNodeStats};
