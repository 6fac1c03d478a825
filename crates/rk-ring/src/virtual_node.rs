use rk_crypto::sha256_32;

/// One point on the ring. Several of these, spread across distinct hash
/// positions, back a single physical storage node to smooth out the load
/// distribution consistent hashing would otherwise give it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualNode {
    /// `"ip:port:i"` for virtual index `i` of some physical node.
    pub id: String,
    pub physical_node_id: u32,
}

impl VirtualNode {
    pub fn new(id: impl Into<String>, physical_node_id: u32) -> Self {
        Self {
            id: id.into(),
            physical_node_id,
        }
    }

    /// This virtual node's fixed position on the ring.
    pub fn position(&self) -> u32 {
        sha256_32(self.id.as_bytes())
    }
}
