//! # Cross-Cutting Error Types
//!
//! Error enums shared by more than one subsystem crate. Subsystem-specific
//! errors live in their own crates (mirroring the teacher's
//! `domain::errors` per-subsystem convention).

use thiserror::Error;

/// Errors produced while building or reading an envelope, independent of
/// whether it has been verified yet (verification errors are
/// `pdsno_c2_messaging::VerifyError`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

/// The six admission-protocol failure states named in spec §4.4, shared
/// between `pdsno-c4-admission` and anything that needs to report or match
/// on them (e.g. telemetry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionFailure {
    #[error("bootstrap request timestamp is outside the freshness window")]
    StaleTimestamp,
    #[error("temp_id is blocklisted")]
    BlockedTempId,
    #[error("bootstrap_token failed HMAC verification")]
    InvalidBootstrapToken,
    #[error("challenge response signature did not verify")]
    ChallengeSignatureInvalid,
    #[error("requested role/region does not match delegation policy")]
    PolicyMismatch,
    #[error("NIB write failed during identity issuance")]
    NibWriteFailed,
}
