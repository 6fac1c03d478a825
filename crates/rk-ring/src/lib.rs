//! Consistent hashing ring and replica placement: decides which physical
//! storage nodes hold which blocks.

pub mod errors;
pub mod placement;
pub mod ring;
pub mod virtual_node;

pub use errors::RingError;
pub use placement::place_replicas;
pub use ring::HashRing;
pub use virtual_node::VirtualNode;
