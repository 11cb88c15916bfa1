//! Canonical content hashing (spec §3: `config_hash` is "hash of
//! canonicalized payload"). Grounded on `shared-crypto::hashing`.

use sha2::{Digest, Sha256};

/// SHA-256 of `bytes`, returned as lowercase hex. Used for `config_hash` and
/// for fingerprinting discovery snapshots.
pub fn canonical_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(canonical_hash(b"payload"), canonical_hash(b"payload"));
    }

    #[test]
    fn hash_changes_with_input() {
        assert_ne!(canonical_hash(b"a"), canonical_hash(b"b"));
    }
}
