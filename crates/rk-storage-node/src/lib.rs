//! The storage node binary's library half: configuration and the HTTP façade
//! over [`rk_storage::DiskStorage`].

pub mod config;
pub mod errors;
pub mod server;

pub use config::StorageConfig;
pub use errors::ServerError;
pub use server::StorageServer;
