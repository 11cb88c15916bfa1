//! Per-peer-pair key management with rotation grace period (spec §4.2
//! "Key management"). Generalized from `shared-crypto`'s single shared-secret
//! model to a keyed ring, since PDSNO has many controller pairs rather than
//! one blockchain-wide gossip secret.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Minimum acceptable secret length (spec §4.2: "32 bytes minimum").
pub const MIN_SECRET_LEN: usize = 32;

/// A secret plus, if it was just rotated, the previous secret which remains
/// valid for the grace period.
#[derive(Debug, Clone)]
pub struct PeerSecret {
    pub current: Vec<u8>,
    pub previous: Option<Vec<u8>>,
    pub rotated_at: Option<DateTime<Utc>>,
}

impl PeerSecret {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            current: secret,
            previous: None,
            rotated_at: None,
        }
    }

    /// Rotate to a new secret; the old one is retained as `previous`.
    pub fn rotate(&mut self, new_secret: Vec<u8>, now: DateTime<Utc>) {
        self.previous = Some(std::mem::replace(&mut self.current, new_secret));
        self.rotated_at = Some(now);
    }

    /// Candidate secrets to try verification against, given the rotation
    /// grace period. `previous` is offered only while `now` is within
    /// `grace` of `rotated_at` (spec §4.2: "old secret remains valid for a
    /// grace period equal to the freshness window").
    pub fn verification_candidates(
        &self,
        now: DateTime<Utc>,
        grace: chrono::Duration,
    ) -> Vec<&[u8]> {
        let mut candidates = vec![self.current.as_slice()];
        if let (Some(prev), Some(rotated_at)) = (&self.previous, self.rotated_at) {
            if now - rotated_at <= grace {
                candidates.push(prev.as_slice());
            }
        }
        candidates
    }
}

/// Derives a deterministic key-id from a sorted controller-id pair (spec
/// §4.2: "both sides agree without a lookup round-trip") and stores a
/// `PeerSecret` per key-id.
#[derive(Debug, Default)]
pub struct KeyRing {
    secrets: HashMap<String, PeerSecret>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic key-id for an unordered pair of controller ids.
    pub fn key_id(a: &str, b: &str) -> String {
        if a <= b {
            format!("{a}|{b}")
        } else {
            format!("{b}|{a}")
        }
    }

    pub fn insert(&mut self, a: &str, b: &str, secret: Vec<u8>) {
        self.secrets
            .insert(Self::key_id(a, b), PeerSecret::new(secret));
    }

    pub fn get(&self, a: &str, b: &str) -> Option<&PeerSecret> {
        self.secrets.get(&Self::key_id(a, b))
    }

    pub fn rotate(&mut self, a: &str, b: &str, new_secret: Vec<u8>, now: DateTime<Utc>) {
        self.secrets
            .entry(Self::key_id(a, b))
            .and_modify(|s| s.rotate(new_secret.clone(), now))
            .or_insert_with(|| PeerSecret::new(new_secret));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_is_order_independent() {
        assert_eq!(
            KeyRing::key_id("gc", "rc_zone_a"),
            KeyRing::key_id("rc_zone_a", "gc")
        );
    }

    #[test]
    fn rotation_keeps_previous_secret_valid_within_grace() {
        let mut secret = PeerSecret::new(vec![1u8; 32]);
        let t0 = Utc::now();
        secret.rotate(vec![2u8; 32], t0);

        let grace = chrono::Duration::minutes(5);
        let candidates = secret.verification_candidates(t0 + chrono::Duration::minutes(1), grace);
        assert_eq!(candidates.len(), 2);

        let candidates_after =
            secret.verification_candidates(t0 + chrono::Duration::minutes(10), grace);
        assert_eq!(candidates_after.len(), 1);
    }
}
