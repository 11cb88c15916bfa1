//! Verification pipeline (spec §4.2): structural → freshness → replay →
//! signature → optional sender check, rejecting on the first failure.
//! Grounded on `qc-02-block-storage::ipc::envelope::validator::EnvelopeValidator`.

use chrono::{DateTime, Utc};
use pdsno_bus::NonceCache;
use pdsno_types::Envelope;

use crate::errors::VerifyError;

/// Maximum clock skew tolerated either direction (spec §4.2: "|now -
/// signed_at| <= 5 minutes").
pub const FRESHNESS_WINDOW_SECS: i64 = 5 * 60;

/// Stateful verifier: owns the nonce cache (spec §4.2 "Nonce store") and the
/// HMAC secret used to verify inbound envelopes from one peer.
pub struct Authenticator {
    secret: Vec<u8>,
    nonce_cache: NonceCache,
}

impl Authenticator {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            nonce_cache: NonceCache::new(FRESHNESS_WINDOW_SECS),
        }
    }

    /// Run the full verification pipeline against `envelope`. On success the
    /// nonce is recorded so a replay of the exact same bytes fails at step 3
    /// on any subsequent call.
    pub fn verify(
        &mut self,
        envelope: &Envelope,
        expected_sender: Option<&str>,
    ) -> Result<(), VerifyError> {
        self.verify_at(envelope, expected_sender, Utc::now())
    }

    /// Same as `verify`, but with an injectable clock for deterministic
    /// tests of the freshness/replay boundary.
    pub fn verify_at(
        &mut self,
        envelope: &Envelope,
        expected_sender: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), VerifyError> {
        // 1. Structural.
        if envelope.message_id.is_empty() || envelope.sender_id.is_empty() {
            return Err(VerifyError::Malformed(
                "message_id and sender_id must be non-empty".into(),
            ));
        }
        let signed_at = DateTime::parse_from_rfc3339(&envelope.signed_at)
            .map_err(|e| VerifyError::Malformed(format!("signed_at: {e}")))?
            .with_timezone(&Utc);

        // 2. Freshness.
        let delta = (now - signed_at).num_seconds();
        if delta > FRESHNESS_WINDOW_SECS {
            return Err(VerifyError::Stale);
        }
        if delta < -FRESHNESS_WINDOW_SECS {
            return Err(VerifyError::FutureDated);
        }

        // 3. Replay.
        self.nonce_cache
            .check_and_record(&envelope.nonce, now.timestamp())
            .map_err(|_| VerifyError::Replay)?;
        let occupancy = self.nonce_cache.occupancy();
        pdsno_telemetry::metrics::NONCE_CACHE_OCCUPANCY.set(occupancy);
        if occupancy >= 0.9 {
            pdsno_telemetry::metrics::NONCE_CACHE_NEAR_CAPACITY.inc();
        }

        // 4. Signature, constant-time.
        let canonical = envelope
            .canonical_bytes()
            .map_err(|e| VerifyError::Malformed(e.to_string()))?;
        if !pdsno_crypto::hmac_verify(&self.secret, &canonical, &envelope.signature) {
            return Err(VerifyError::BadSignature);
        }

        // 5. Sender check (optional).
        if let Some(expected) = expected_sender {
            if envelope.sender_id != expected {
                return Err(VerifyError::WrongSender {
                    expected: expected.to_string(),
                    actual: envelope.sender_id.clone(),
                });
            }
        }

        Ok(())
    }

    /// Current nonce cache occupancy, surfaced to telemetry.
    pub fn nonce_cache_occupancy(&self) -> f64 {
        self.nonce_cache.occupancy()
    }
}
