//! Admission failure states (spec §4.4 "Failure states"). Each variant is
//! reported to the candidate as a `VALIDATION_RESULT{error=true, reason}`;
//! none are retried automatically by this crate.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("validation_request timestamp is outside the freshness window")]
    StaleTimestamp,
    #[error("temp_id is currently blocklisted")]
    BlockedTempId,
    #[error("bootstrap_token does not verify for (temp_id, region, role)")]
    InvalidBootstrapToken,
    #[error("challenge_id does not match a pending challenge")]
    UnknownChallenge,
    #[error("challenge response signature is invalid or the nonce does not match")]
    ChallengeSignatureInvalid,
    #[error("classifying policy_version does not match the parent's")]
    PolicyMismatch,
    #[error("NIB write failed during identity allocation: {0}")]
    NibWriteFailed(String),
    #[error("malformed admission message: {0}")]
    Malformed(String),
}

impl AdmissionError {
    /// The wire-level `reason` string for a `VALIDATION_RESULT{error=true}`
    /// (spec §4.4's named failure-state list).
    pub fn reason(&self) -> &'static str {
        match self {
            Self::StaleTimestamp => "stale_timestamp",
            Self::BlockedTempId => "blocked_temp_id",
            Self::InvalidBootstrapToken => "invalid_bootstrap_token",
            Self::UnknownChallenge => "challenge_signature_invalid",
            Self::ChallengeSignatureInvalid => "challenge_signature_invalid",
            Self::PolicyMismatch => "policy_mismatch",
            Self::NibWriteFailed(_) => "nib_write_failed",
            Self::Malformed(_) => "malformed",
        }
    }
}

impl From<pdsno_c1_nib::NibError> for AdmissionError {
    fn from(e: pdsno_c1_nib::NibError) -> Self {
        Self::NibWriteFailed(e.to_string())
    }
}
