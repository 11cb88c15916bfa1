//! Execution token issuance and verification (spec §4.6 "Execution token
//! issuance... Execution"). Grounded on `pdsno-c4-admission::credential`'s
//! canonical-bytes-then-ed25519-sign pattern, applied to the fields spec.md
//! names: `(request_id, config_hash, devices, controller_id)` plus the
//! issuance bookkeeping fields already on `pdsno_types::ExecutionToken`.

use pdsno_crypto::{ed25519_verify, Ed25519Error, Ed25519KeyPair};
use pdsno_types::{ExecutionToken, Id, Sensitivity, TokenConstraints};
use serde::Serialize;

use crate::errors::ApprovalError;

/// TTL in seconds granted to a freshly issued token, shorter for higher
/// sensitivity per spec.md "a TTL appropriate to sensitivity (shorter for
/// HIGH/EMERGENCY)".
pub fn ttl_secs_for(sensitivity: Sensitivity) -> i64 {
    match sensitivity {
        Sensitivity::Low => 30 * 60,
        Sensitivity::Medium => 15 * 60,
        Sensitivity::High => 5 * 60,
        Sensitivity::Emergency => 2 * 60,
    }
}

fn canonical_bytes(
    token_id: &str,
    request_id: &str,
    config_hash: &str,
    scope: &[Id],
    issuer_id: &str,
    issued_at: i64,
    expires_at: i64,
    max_uses: u32,
) -> Vec<u8> {
    #[derive(Serialize)]
    struct Unsigned<'a> {
        token_id: &'a str,
        request_id: &'a str,
        config_hash: &'a str,
        scope: &'a [Id],
        issuer_id: &'a str,
        issued_at: i64,
        expires_at: i64,
        max_uses: u32,
    }
    serde_json::to_vec(&Unsigned {
        token_id,
        request_id,
        config_hash,
        scope,
        issuer_id,
        issued_at,
        expires_at,
        max_uses,
    })
    .expect("token fields always serialize")
}

#[allow(clippy::too_many_arguments)]
pub fn issue(
    token_id: impl Into<Id>,
    request_id: impl Into<Id>,
    config_hash: impl Into<String>,
    scope: Vec<Id>,
    issuer_id: impl Into<Id>,
    issued_at: i64,
    sensitivity: Sensitivity,
    constraints: TokenConstraints,
    keypair: &Ed25519KeyPair,
) -> ExecutionToken {
    let token_id = token_id.into();
    let request_id = request_id.into();
    let config_hash = config_hash.into();
    let issuer_id = issuer_id.into();
    let expires_at = issued_at + ttl_secs_for(sensitivity);

    let message = canonical_bytes(
        &token_id,
        &request_id,
        &config_hash,
        &scope,
        &issuer_id,
        issued_at,
        expires_at,
        1,
    );
    let signature = keypair.sign(&message).to_vec();

    ExecutionToken {
        token_id,
        request_id,
        config_hash,
        scope,
        issuer_id,
        issued_at,
        expires_at,
        max_uses: 1,
        consumed_at: None,
        constraints,
        signature,
    }
}

/// Spec §4.6 "Token verification: unexpired, unconsumed, scope equals
/// current `target_devices` exactly, signature valid, constraints satisfied
/// by runtime state." Expiry/consumption are checked atomically by the NIB
/// at `consume_execution_token` time; this function covers the parts only
/// the caller can check: scope and signature.
pub fn verify_scope_and_signature(
    token: &ExecutionToken,
    current_target_devices: &[Id],
    issuer_public_key: &[u8],
) -> Result<(), ApprovalError> {
    let mut expected: Vec<&Id> = current_target_devices.iter().collect();
    let mut actual: Vec<&Id> = token.scope.iter().collect();
    expected.sort();
    actual.sort();
    if expected != actual {
        return Err(ApprovalError::TokenScopeMismatch {
            token_id: token.token_id.clone(),
        });
    }

    let message = canonical_bytes(
        &token.token_id,
        &token.request_id,
        &token.config_hash,
        &token.scope,
        &token.issuer_id,
        token.issued_at,
        token.expires_at,
        token.max_uses,
    );
    match ed25519_verify(issuer_public_key, &message, &token.signature) {
        Ok(()) => Ok(()),
        Err(Ed25519Error::VerificationFailed | Ed25519Error::InvalidSignature | Ed25519Error::InvalidPublicKey) => {
            Err(ApprovalError::TokenSignatureInvalid {
                token_id: token.token_id.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Vec<Id> {
        vec!["dev_a".to_string(), "dev_b".to_string()]
    }

    #[test]
    fn issued_token_has_ttl_scaled_to_sensitivity() {
        let keypair = Ed25519KeyPair::generate();
        let token = issue(
            "tok1",
            "req1",
            "hash1",
            scope(),
            "rc_zone-a",
            1000,
            Sensitivity::High,
            TokenConstraints::default(),
            &keypair,
        );
        assert_eq!(token.expires_at - token.issued_at, ttl_secs_for(Sensitivity::High));
        assert_eq!(token.max_uses, 1);
    }

    #[test]
    fn scope_and_signature_verify_for_an_untampered_token() {
        let keypair = Ed25519KeyPair::generate();
        let token = issue(
            "tok1",
            "req1",
            "hash1",
            scope(),
            "rc_zone-a",
            1000,
            Sensitivity::Low,
            TokenConstraints::default(),
            &keypair,
        );
        assert!(verify_scope_and_signature(&token, &scope(), &keypair.public_key_bytes()).is_ok());
    }

    #[test]
    fn narrowed_scope_at_presentation_time_is_rejected() {
        let keypair = Ed25519KeyPair::generate();
        let token = issue(
            "tok1",
            "req1",
            "hash1",
            scope(),
            "rc_zone-a",
            1000,
            Sensitivity::Low,
            TokenConstraints::default(),
            &keypair,
        );
        let narrowed = vec!["dev_a".to_string()];
        let result = verify_scope_and_signature(&token, &narrowed, &keypair.public_key_bytes());
        assert!(matches!(result, Err(ApprovalError::TokenScopeMismatch { .. })));
    }

    #[test]
    fn wrong_issuer_key_fails_signature_verification() {
        let keypair = Ed25519KeyPair::generate();
        let other = Ed25519KeyPair::generate();
        let token = issue(
            "tok1",
            "req1",
            "hash1",
            scope(),
            "rc_zone-a",
            1000,
            Sensitivity::Low,
            TokenConstraints::default(),
            &keypair,
        );
        let result = verify_scope_and_signature(&token, &scope(), &other.public_key_bytes());
        assert!(matches!(result, Err(ApprovalError::TokenSignatureInvalid { .. })));
    }
}
