//! Envelope construction and signing.

use chrono::Utc;
use pdsno_types::envelope::Destination;
use pdsno_types::Envelope;

/// Build and sign a new envelope. `secret` is the per-peer-pair HMAC key
/// (spec §4.2 "Key management") for `(sender_id, recipient_id)`.
pub fn sign_envelope(
    sender_id: &str,
    recipient: Destination,
    message_type: &str,
    payload: serde_json::Value,
    secret: &[u8],
) -> Envelope {
    let mut envelope = Envelope {
        message_id: uuid::Uuid::new_v4().to_string(),
        sender_id: sender_id.to_string(),
        recipient,
        message_type: message_type.to_string(),
        payload,
        signed_at: Utc::now().to_rfc3339(),
        nonce: pdsno_crypto::generate_nonce(),
        signature: String::new(),
    };
    let canonical = envelope
        .canonical_bytes()
        .expect("freshly constructed envelope always canonicalizes");
    envelope.signature = pdsno_crypto::hmac_sign(secret, &canonical);
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_envelope_has_nonempty_signature() {
        let e = sign_envelope(
            "gc",
            Destination::Controller("rc".into()),
            "HEARTBEAT",
            serde_json::json!({}),
            b"shared-secret-material-32-bytes",
        );
        assert!(!e.signature.is_empty());
    }
}
