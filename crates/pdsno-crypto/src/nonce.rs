//! 32-byte random nonce generation, base64-encoded (spec §4.2).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;

/// Generate a fresh 32-byte nonce and return it base64-encoded.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_are_distinct() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_ne!(a, b);
    }

    #[test]
    fn nonce_decodes_to_32_bytes() {
        let n = generate_nonce();
        let decoded = STANDARD.decode(n).unwrap();
        assert_eq!(decoded.len(), 32);
    }
}
