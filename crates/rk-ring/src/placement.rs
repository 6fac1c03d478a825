use rk_crypto::sha256_32;

use crate::errors::RingError;
use crate::ring::HashRing;

/// Picks `replication_factor` distinct, healthy physical node ids to hold
/// `block_num` of `key`, walking the ring clockwise from `sha256_32(key +
/// blockNum)` and skipping virtual nodes whose physical node is already
/// used or unhealthy.
///
/// `is_healthy` is consulted once per candidate physical node id.
pub fn place_replicas(
    ring: &HashRing,
    key: &str,
    block_num: u32,
    replication_factor: u32,
    is_healthy: impl Fn(u32) -> bool,
) -> Result<Vec<u32>, RingError> {
    let mut hash = sha256_32(format!("{key}{block_num}").as_bytes());
    let mut used = Vec::with_capacity(replication_factor as usize);

    let max_probes = ring.node_count() as u32 + 1;

    for _ in 0..replication_factor {
        let mut found = false;
        for _ in 0..max_probes {
            let vn = ring.find_next_node(hash)?;
            if !used.contains(&vn.physical_node_id) && is_healthy(vn.physical_node_id) {
                used.push(vn.physical_node_id);
                hash = vn.position();
                found = true;
                break;
            }
            hash = vn.position();
        }
        if !found {
            let healthy = ring
                .virtual_nodes()
                .map(|vn| vn.physical_node_id)
                .filter(|id| is_healthy(*id))
                .collect::<std::collections::HashSet<_>>()
                .len() as u32;
            return Err(RingError::InsufficientReplicas {
                required: replication_factor,
                healthy,
            });
        }
    }

    Ok(used)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_ring(num_physical: u32, num_virtual: u32) -> HashRing {
        let mut ring = HashRing::new();
        for i in 0..num_physical {
            ring.add_physical_node(&format!("127.0.0.1:{i}"), i, num_virtual);
        }
        ring
    }

    #[test]
    fn places_distinct_healthy_replicas() {
        let ring = build_ring(5, 20);
        let replicas = place_replicas(&ring, "archive.zip", 0, 3, |_| true).unwrap();
        assert_eq!(replicas.len(), 3);
        let unique: std::collections::HashSet<_> = replicas.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn skips_unhealthy_nodes() {
        let ring = build_ring(4, 20);
        let replicas = place_replicas(&ring, "archive.zip", 0, 3, |id| id != 1).unwrap();
        assert!(!replicas.contains(&1));
        assert_eq!(replicas.len(), 3);
    }

    #[test]
    fn fails_when_not_enough_healthy_nodes() {
        let ring = build_ring(3, 20);
        let err = place_replicas(&ring, "archive.zip", 0, 3, |id| id == 0).unwrap_err();
        assert!(matches!(
            err,
            RingError::InsufficientReplicas {
                required: 3,
                healthy: 1
            }
        ));
    }

    #[test]
    fn same_key_and_block_always_places_the_same_way() {
        let ring = build_ring(5, 20);
        let a = place_replicas(&ring, "archive.zip", 7, 3, |_| true).unwrap();
        let b = place_replicas(&ring, "archive.zip", 7, 3, |_| true).unwrap();
        assert_eq!(a, b);
    }
}
