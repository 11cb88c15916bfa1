//! Typed payload shapes for the six admission messages (spec §4.4 table).
//! Carried as the `payload` of a `pdsno_types::Envelope`; construction and
//! signing of the envelope itself belongs to the caller (the runtime that
//! wires this crate to C2/C3), keeping the protocol logic here free of a
//! transport dependency.

use pdsno_types::entities::ControllerRole;
use serde::{Deserialize, Serialize};

use crate::credential::DelegationCredential;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub temp_id: String,
    pub role: ControllerRole,
    pub region: Option<String>,
    pub public_key: Vec<u8>,
    pub bootstrap_token: String,
    /// RFC 3339 UTC, checked against the parent's clock within the
    /// freshness window shared with C2 envelope verification.
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge_id: String,
    /// Base64-encoded 32 random bytes.
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge_id: String,
    pub nonce: String,
    /// Base64-encoded ed25519 signature of `nonce`'s decoded bytes under
    /// the candidate's private key.
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub error: bool,
    pub assigned_id: Option<String>,
    pub certificate: Option<Vec<u8>>,
    pub delegation_credential: Option<DelegationCredential>,
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn failure(reason: &str) -> Self {
        Self {
            error: true,
            assigned_id: None,
            certificate: None,
            delegation_credential: None,
            reason: Some(reason.to_string()),
        }
    }
}
