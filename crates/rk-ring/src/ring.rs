use std::collections::BTreeMap;
use std::ops::Bound;

use crate::errors::RingError;
use crate::virtual_node::VirtualNode;

/// Consistent hash ring: a sorted map from 32-bit ring position to the
/// virtual node occupying it.
#[derive(Debug, Clone, Default)]
pub struct HashRing {
    ring: BTreeMap<u32, VirtualNode>,
}

impl HashRing {
    pub fn new() -> Self {
        Self {
            ring: BTreeMap::new(),
        }
    }

    /// Adds `num_virtual_nodes` virtual nodes for the physical node
    /// `physical_node_id`, reachable at `ip_port`. A virtual node whose
    /// position collides with an existing one overwrites it.
    pub fn add_physical_node(&mut self, ip_port: &str, physical_node_id: u32, num_virtual_nodes: u32) {
        for i in 0..num_virtual_nodes {
            let vn = VirtualNode::new(format!("{ip_port}:{i}"), physical_node_id);
            self.ring.insert(vn.position(), vn);
        }
    }

    /// Removes every virtual node belonging to `physical_node_id`.
    pub fn remove_physical_node(&mut self, physical_node_id: u32) {
        self.ring.retain(|_, vn| vn.physical_node_id != physical_node_id);
    }

    pub fn node_count(&self) -> usize {
        self.ring.len()
    }

    /// The next virtual node strictly past `hash`, wrapping to the first
    /// entry if `hash` is past the last one.
    pub fn find_next_node(&self, hash: u32) -> Result<&VirtualNode, RingError> {
        self.ring
            .range((Bound::Excluded(hash), Bound::Unbounded))
            .next()
            .map(|(_, vn)| vn)
            .or_else(|| self.ring.values().next())
            .ok_or(RingError::Empty)
    }

    pub fn virtual_nodes(&self) -> impl Iterator<Item = &VirtualNode> {
        self.ring.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_next_node_matches_manual_upper_bound() {
        let mut ring = HashRing::new();
        let num_physical_nodes = 3;
        let num_virtual_nodes = 10;

        for i in 0..num_physical_nodes {
            ring.add_physical_node(&format!("127.0.0.1:{i}"), i, num_virtual_nodes);
        }
        assert_eq!(ring.node_count(), (num_physical_nodes * num_virtual_nodes) as usize);

        let mut sorted: Vec<(u32, &VirtualNode)> =
            ring.virtual_nodes().map(|vn| (vn.position(), vn)).collect();
        sorted.sort_by_key(|(pos, _)| *pos);

        for i in 0..10u32 {
            let key_hash = rk_crypto::sha256_32(format!("archive.zip{i}").as_bytes());
            let next = ring.find_next_node(key_hash).unwrap();

            let expected = sorted
                .iter()
                .find(|(pos, _)| *pos > key_hash)
                .map(|(_, vn)| *vn)
                .unwrap_or(sorted[0].1);

            assert_eq!(next.id, expected.id);
        }
    }

    #[test]
    fn evenly_distributes_across_physical_nodes() {
        let mut ring = HashRing::new();
        let num_physical_nodes = 5u32;
        let num_virtual_nodes = 100;

        for i in 0..num_physical_nodes {
            ring.add_physical_node(&format!("127.0.0.1:{i}"), i, num_virtual_nodes);
        }

        let num_blocks = 100_000;
        let mut freqs = vec![0u32; num_physical_nodes as usize];
        for i in 0..num_blocks {
            let hash = rk_crypto::sha256_32(format!("archive.zip{i}").as_bytes());
            let vn = ring.find_next_node(hash).unwrap();
            freqs[vn.physical_node_id as usize] += 1;
        }

        let expected_pct = 100.0 / num_physical_nodes as f64;
        let epsilon = 5.0;
        for freq in freqs {
            let pct = freq as f64 / num_blocks as f64 * 100.0;
            assert!(
                (pct - expected_pct).abs() <= epsilon,
                "node got {pct:.2}% of blocks, expected ~{expected_pct:.2}%"
            );
        }
    }

    #[test]
    fn removing_physical_node_drops_its_virtual_nodes() {
        let mut ring = HashRing::new();
        ring.add_physical_node("127.0.0.1:0", 0, 10);
        ring.add_physical_node("127.0.0.1:1", 1, 10);
        assert_eq!(ring.node_count(), 20);

        ring.remove_physical_node(0);
        assert_eq!(ring.node_count(), 10);
        assert!(ring.virtual_nodes().all(|vn| vn.physical_node_id == 1));
    }

    #[test]
    fn find_next_node_on_empty_ring_fails() {
        let ring = HashRing::new();
        assert!(matches!(ring.find_next_node(42), Err(RingError::Empty)));
    }
}
