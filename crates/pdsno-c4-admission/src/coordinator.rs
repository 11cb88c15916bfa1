//! `AdmissionCoordinator`: the parent side of the six-step exchange (spec
//! §4.4). Grounded on `qc-01-peer-discovery::ipc::bootstrap`'s
//! stage-then-promote flow, generalized from PoW-gated peer staging to
//! bootstrap-token-gated controller staging with an asymmetric
//! challenge/response in the middle.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use pdsno_c1_nib::{NibStore, Write};
use pdsno_crypto::{ed25519_verify, generate_nonce, Ed25519KeyPair};
use pdsno_types::entities::{Controller, ControllerRole, ControllerStatus, Event};
use pdsno_types::Id;
use tracing::{info, warn};
use uuid::Uuid;

use crate::blocklist::TempIdBlocklist;
use crate::bootstrap_token;
use crate::challenge::{ChallengeStore, PendingChallenge};
use crate::credential::DelegationCredential;
use crate::errors::AdmissionError;
use crate::messages::{Challenge, ChallengeResponse, ValidationRequest, ValidationResult};
use crate::sequence::AssignedIdSequencer;

/// Clock-skew tolerance for `VALIDATION_REQUEST.timestamp` (spec §4.4 step
/// 2), shared in spirit with C2's envelope freshness window.
pub const FRESHNESS_WINDOW_SECS: i64 = 5 * 60;

#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub bootstrap_secret: Vec<u8>,
    pub challenge_ttl_secs: i64,
    /// How long a `temp_id` stays blocklisted after an invalid bootstrap
    /// token (spec §4.4 step 2's blocklist is silent on TTL; we bound it
    /// rather than ban forever, consistent with the nonce cache's bounded
    /// design).
    pub failed_token_block_secs: i64,
    pub certificate_ttl_secs: i64,
    pub delegation_ttl_secs: i64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            bootstrap_secret: Vec::new(),
            challenge_ttl_secs: 120,
            failed_token_block_secs: 15 * 60,
            certificate_ttl_secs: 365 * 24 * 60 * 60,
            delegation_ttl_secs: 90 * 24 * 60 * 60,
        }
    }
}

pub struct AdmissionCoordinator {
    nib: Arc<dyn NibStore>,
    keypair: Ed25519KeyPair,
    parent_id: Id,
    sequencer: AssignedIdSequencer,
    blocklist: TempIdBlocklist,
    challenges: ChallengeStore,
    config: AdmissionConfig,
}

impl AdmissionCoordinator {
    pub fn new(
        nib: Arc<dyn NibStore>,
        keypair: Ed25519KeyPair,
        parent_id: impl Into<Id>,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            nib,
            keypair,
            parent_id: parent_id.into(),
            sequencer: AssignedIdSequencer::new(),
            blocklist: TempIdBlocklist::new(),
            challenges: ChallengeStore::new(),
            config,
        }
    }

    /// Steps 1–4: validate the request, then stage a fresh challenge.
    pub fn handle_validation_request(
        &self,
        request: &ValidationRequest,
        now: DateTime<Utc>,
    ) -> Result<Challenge, AdmissionError> {
        let now_secs = now.timestamp();

        let signed_at = DateTime::parse_from_rfc3339(&request.timestamp)
            .map_err(|e| AdmissionError::Malformed(format!("timestamp: {e}")))?
            .with_timezone(&Utc);
        if (now - signed_at).num_seconds().abs() > FRESHNESS_WINDOW_SECS {
            pdsno_telemetry::metrics::ADMISSION_OUTCOMES
                .with_label_values(&["stale_timestamp"])
                .inc();
            return Err(AdmissionError::StaleTimestamp);
        }

        if self.blocklist.is_blocked(&request.temp_id, now_secs) {
            pdsno_telemetry::metrics::ADMISSION_OUTCOMES
                .with_label_values(&["blocked_temp_id"])
                .inc();
            return Err(AdmissionError::BlockedTempId);
        }

        if !bootstrap_token::verify(
            &request.bootstrap_token,
            &request.temp_id,
            request.region.as_deref(),
            request.role,
            &self.config.bootstrap_secret,
        ) {
            self.blocklist.block(
                request.temp_id.clone(),
                now_secs + self.config.failed_token_block_secs,
            );
            pdsno_telemetry::metrics::ADMISSION_OUTCOMES
                .with_label_values(&["invalid_bootstrap_token"])
                .inc();
            warn!(temp_id = %request.temp_id, "invalid bootstrap token, blocklisting");
            return Err(AdmissionError::InvalidBootstrapToken);
        }

        let challenge_id = Uuid::new_v4().to_string();
        let nonce = generate_nonce();
        self.challenges.insert(PendingChallenge {
            challenge_id: challenge_id.clone(),
            temp_id: request.temp_id.clone(),
            role: request.role,
            region: request.region.clone(),
            public_key: request.public_key.clone(),
            nonce: nonce.clone(),
            issued_at: now_secs,
            expires_at: now_secs + self.config.challenge_ttl_secs,
        });

        Ok(Challenge { challenge_id, nonce })
    }

    /// Steps 5–6: verify the signed nonce, allocate an identity, persist it
    /// atomically, and return the signed result.
    pub fn handle_challenge_response(
        &self,
        response: &ChallengeResponse,
        now: DateTime<Utc>,
    ) -> Result<ValidationResult, AdmissionError> {
        let now_secs = now.timestamp();

        let pending = match self.challenges.take(&response.challenge_id) {
            Some(pending) => pending,
            None => {
                pdsno_telemetry::metrics::ADMISSION_OUTCOMES
                    .with_label_values(&["unknown_challenge"])
                    .inc();
                return Err(AdmissionError::UnknownChallenge);
            }
        };

        if pending.expires_at < now_secs || pending.nonce != response.nonce {
            pdsno_telemetry::metrics::ADMISSION_OUTCOMES
                .with_label_values(&["challenge_signature_invalid"])
                .inc();
            return Err(AdmissionError::ChallengeSignatureInvalid);
        }

        let nonce_bytes = STANDARD
            .decode(&pending.nonce)
            .map_err(|e| AdmissionError::Malformed(format!("nonce: {e}")))?;
        let signature_bytes = STANDARD
            .decode(&response.signature)
            .map_err(|e| AdmissionError::Malformed(format!("signature: {e}")))?;

        if ed25519_verify(&pending.public_key, &nonce_bytes, &signature_bytes).is_err() {
            pdsno_telemetry::metrics::ADMISSION_OUTCOMES
                .with_label_values(&["challenge_signature_invalid"])
                .inc();
            return Err(AdmissionError::ChallengeSignatureInvalid);
        }

        let assigned_id = self
            .sequencer
            .next_assigned_id(pending.role, pending.region.as_deref());

        let certificate = self.sign_certificate(&assigned_id, &pending, now_secs);

        let controller = Controller {
            controller_id: assigned_id.clone(),
            role: pending.role,
            region: pending.region.clone(),
            status: ControllerStatus::Active,
            validated_by: self.parent_id.clone(),
            validated_at: now_secs,
            public_key: pending.public_key.clone(),
            certificate: certificate.clone(),
            capabilities: Vec::new(),
            version: 0,
        };

        let event = Event {
            event_id: Uuid::new_v4().to_string(),
            event_type: "CONTROLLER_VALIDATED".to_string(),
            actor_id: assigned_id.clone(),
            timestamp: now_secs,
            payload: serde_json::json!({
                "validated_by": self.parent_id,
                "role": pending.role,
                "region": pending.region,
            }),
            hmac: None,
        };

        // Atomic per spec §4.4 "Identity allocation": on NIB failure no
        // identity is returned.
        self.nib
            .transaction(vec![
                Write::UpsertController {
                    controller,
                    expected_version: None,
                },
                Write::AppendEvent { event },
            ])
            .map_err(AdmissionError::from)?;

        pdsno_telemetry::metrics::ADMISSION_OUTCOMES
            .with_label_values(&["success"])
            .inc();
        info!(assigned_id = %assigned_id, "admitted controller");

        let delegation_credential = (pending.role == ControllerRole::Regional).then(|| {
            DelegationCredential::issue(
                Uuid::new_v4().to_string(),
                self.parent_id.clone(),
                assigned_id.clone(),
                pending.region.clone(),
                vec!["local_controllers".to_string()],
                vec!["admit_local".to_string()],
                now_secs,
                now_secs + self.config.delegation_ttl_secs,
                &self.keypair,
            )
        });

        Ok(ValidationResult {
            error: false,
            assigned_id: Some(assigned_id),
            certificate: Some(certificate),
            delegation_credential,
            reason: None,
        })
    }

    fn sign_certificate(
        &self,
        assigned_id: &str,
        pending: &PendingChallenge,
        issued_at: i64,
    ) -> Vec<u8> {
        #[derive(serde::Serialize)]
        struct CertificateClaims<'a> {
            assigned_id: &'a str,
            public_key: &'a [u8],
            issued_by: &'a str,
            issued_at: i64,
            expires_at: i64,
        }
        let claims = CertificateClaims {
            assigned_id,
            public_key: &pending.public_key,
            issued_by: &self.parent_id,
            issued_at,
            expires_at: issued_at + self.config.certificate_ttl_secs,
        };
        let message = serde_json::to_vec(&claims).expect("certificate claims always serialize");
        self.keypair.sign(&message).to_vec()
    }
}
