//! Cryptographic primitives for Rackkey.
//!
//! The cluster needs exactly one primitive: a 32-bit digest used both as a
//! virtual node's position on the hash ring and as a BAT entry's key hash.
//! Truncating SHA-256 to its first 4 bytes gives a digest that is cheap to
//! compute and uniform enough for both uses.

use sha2::{Digest, Sha256};

/// Truncates SHA-256 of `data` to its most-significant 32 bits.
///
/// Used as the ring position function for virtual nodes and as the BAT's
/// key-hash function. Both call sites need a fixed-width, evenly distributed
/// digest rather than cryptographic strength, so truncation is acceptable.
pub fn sha256_32(data: &[u8]) -> u32 {
    let digest = Sha256::digest(data);
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(sha256_32(b"archive.zip0"), sha256_32(b"archive.zip0"));
    }

    #[test]
    fn distinguishes_inputs() {
        assert_ne!(sha256_32(b"archive.zip0"), sha256_32(b"archive.zip1"));
    }

    #[test]
    fn matches_known_vector() {
        // sha256("abc") = ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad
        let expected = u32::from_be_bytes([0xba, 0x78, 0x16, 0xbf]);
        assert_eq!(sha256_32(b"abc"), expected);
    }
}
