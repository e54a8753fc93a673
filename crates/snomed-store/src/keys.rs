//! Key encodings for the store's keyspaces.
//!
//! Composite keys are concatenated big-endian `u64` components so the byte
//! order of RocksDB's default comparator matches numeric order, and prefix
//! scans over a leading component realize the reverse indices.

use snomed_types::SctId;
use uuid::Uuid;

/// Encodes a single identifier.
pub fn id(a: SctId) -> [u8; 8] {
    a.to_be_bytes()
}

/// Encodes an identifier pair.
pub fn pair(a: SctId, b: SctId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..].copy_from_slice(&b.to_be_bytes());
    key
}

/// Encodes an identifier triple.
pub fn triple(a: SctId, b: SctId, c: SctId) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..16].copy_from_slice(&b.to_be_bytes());
    key[16..].copy_from_slice(&c.to_be_bytes());
    key
}

/// Encodes an identifier pair followed by a member UUID.
pub fn pair_uuid(a: SctId, b: SctId, u: Uuid) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..16].copy_from_slice(&b.to_be_bytes());
    key[16..].copy_from_slice(u.as_bytes());
    key
}

/// Encodes a map-target key: `refset_id` + length-prefixed target + UUID.
///
/// The length prefix keeps prefix scans exact: a scan for target `"G35"`
/// must not surface `"G35.9"`.
pub fn map_target(refset_id: SctId, target: &str, u: Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + 2 + target.len() + 16);
    key.extend_from_slice(&refset_id.to_be_bytes());
    key.extend_from_slice(&(target.len() as u16).to_be_bytes());
    key.extend_from_slice(target.as_bytes());
    key.extend_from_slice(u.as_bytes());
    key
}

/// The scan prefix for all items mapping to `target` in `refset_id`.
pub fn map_target_prefix(refset_id: SctId, target: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + 2 + target.len());
    key.extend_from_slice(&refset_id.to_be_bytes());
    key.extend_from_slice(&(target.len() as u16).to_be_bytes());
    key.extend_from_slice(target.as_bytes());
    key
}

/// Decodes the second component of a composite key.
pub fn second(key: &[u8]) -> SctId {
    u64::from_be_bytes(key[8..16].try_into().expect("key too short"))
}

/// Decodes the third component of a composite key.
pub fn third(key: &[u8]) -> SctId {
    u64::from_be_bytes(key[16..24].try_into().expect("key too short"))
}

/// Decodes a trailing UUID from a composite key.
pub fn trailing_uuid(key: &[u8]) -> Uuid {
    let start = key.len() - 16;
    Uuid::from_slice(&key[start..]).expect("key too short")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_orders_numerically() {
        // Byte order must match numeric order for range scans.
        assert!(pair(1, u64::MAX) < pair(2, 0));
        assert!(triple(5, 5, 9) < triple(5, 6, 0));
    }

    #[test]
    fn test_component_decode() {
        let key = triple(24700007, 116680003, 6118003);
        assert_eq!(second(&key), 116680003);
        assert_eq!(third(&key), 6118003);
    }

    #[test]
    fn test_map_target_prefix_is_exact() {
        let u = Uuid::from_u128(7);
        let short = map_target(447562003, "G35", u);
        let long_prefix = map_target_prefix(447562003, "G35.9");
        assert!(!short.starts_with(&long_prefix));
        assert!(map_target(447562003, "G35.9", u).starts_with(&long_prefix));
    }
}
