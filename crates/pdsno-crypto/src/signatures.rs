//! HMAC-SHA256 signing and constant-time verification.
//!
//! Grounded on `qc-02-block-storage/ipc/envelope/security.rs`'s
//! `compute_message_signature`, generalized from a fixed field tuple to an
//! arbitrary canonical byte string (the caller canonicalizes; this module
//! only signs/verifies bytes).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over `message`, returned as a lowercase hex string per spec
/// §4.2 ("signature (HMAC-SHA256 hex...)").
pub fn hmac_sign(secret: &[u8], message: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(message);
    hex_encode(&mac.finalize().into_bytes())
}

/// Recompute the HMAC over `message` and compare against `signature_hex` in
/// constant time (spec §4.2 step 4: "recomputed and compared in constant
/// time").
pub fn hmac_verify(secret: &[u8], message: &[u8], signature_hex: &str) -> bool {
    let Some(expected) = hex_decode(signature_hex) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(message);
    let computed = mac.finalize().into_bytes();
    if computed.len() != expected.len() {
        return false;
    }
    computed.as_slice().ct_eq(&expected).into()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let secret = b"super-secret-key-material-32bytes";
        let msg = b"canonical envelope bytes";
        let sig = hmac_sign(secret, msg);
        assert!(hmac_verify(secret, msg, &sig));
    }

    #[test]
    fn modified_byte_fails_verification() {
        let secret = b"super-secret-key-material-32bytes";
        let msg = b"canonical envelope bytes";
        let sig = hmac_sign(secret, msg);
        assert!(!hmac_verify(secret, b"canonical envelope Bytes", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let msg = b"canonical envelope bytes";
        let sig = hmac_sign(b"key-one-material-that-is-long", msg);
        assert!(!hmac_verify(b"key-two-material-that-is-long", msg, &sig));
    }

    #[test]
    fn malformed_hex_fails_closed() {
        let secret = b"secret";
        assert!(!hmac_verify(secret, b"msg", "not-hex!!"));
    }
}
