//! Verification pipeline errors (spec §4.2: "reject on first failure with
//! named error").

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("signed_at is older than the freshness window")]
    Stale,
    #[error("signed_at is in the future beyond the freshness window")]
    FutureDated,
    #[error("nonce has already been seen")]
    Replay,
    #[error("HMAC signature did not verify")]
    BadSignature,
    #[error("sender_id {actual} does not match expected peer {expected}")]
    WrongSender { expected: String, actual: String },
}
