//! # Authenticated Envelope
//!
//! Wire shape for every inter-controller message (spec §4.2). Canonicalization
//! and signing/verification live in `pdsno-c2-messaging`; this crate only
//! defines the shape and the canonical-bytes helper, since every subsystem
//! that merely *reads* an envelope (without verifying it) still needs the
//! struct.

use serde::{Deserialize, Serialize};

use crate::errors::EnvelopeError;

/// Recipient of an envelope: a specific controller, or a pub/sub topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Controller(String),
    Topic(String),
}

/// Signed envelope wrapping a typed payload.
///
/// Field set matches spec §4.2 exactly. `payload` is left as `serde_json::Value`
/// so the envelope can be canonicalized and signed without the caller's
/// concrete payload type needing to round-trip through this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub message_id: String,
    pub sender_id: String,
    pub recipient: Destination,
    pub message_type: String,
    pub payload: serde_json::Value,
    /// ISO-8601 UTC, e.g. `2026-07-30T12:00:00Z`.
    pub signed_at: String,
    /// 32 random bytes, base64-encoded.
    pub nonce: String,
    /// HMAC-SHA256 hex digest over the canonicalized remaining fields.
    pub signature: String,
}

impl Envelope {
    /// Serialize every field except `signature` to canonical JSON: sorted
    /// keys, no insignificant whitespace. `serde_json`'s default map type is
    /// already key-sorted (the `preserve_order` feature, which would use an
    /// insertion-ordered map, is intentionally not enabled anywhere in this
    /// workspace), so a plain `serde_json::to_vec` over a struct with the
    /// `signature` field dropped already satisfies spec §4.2's
    /// canonicalization rule.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        #[derive(Serialize)]
        struct Unsigned<'a> {
            message_id: &'a str,
            sender_id: &'a str,
            recipient: &'a Destination,
            message_type: &'a str,
            payload: &'a serde_json::Value,
            signed_at: &'a str,
            nonce: &'a str,
        }

        let unsigned = Unsigned {
            message_id: &self.message_id,
            sender_id: &self.sender_id,
            recipient: &self.recipient,
            message_type: &self.message_type,
            payload: &self.payload,
            signed_at: &self.signed_at,
            nonce: &self.nonce,
        };

        serde_json::to_vec(&unsigned).map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }
}
