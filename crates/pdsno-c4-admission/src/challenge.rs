//! Pending-challenge tracking for steps 4–5 of the admission exchange
//! (spec §4.4). A challenge is consumed exactly once: `take` removes it so a
//! replayed `CHALLENGE_RESPONSE` finds nothing pending.

use dashmap::DashMap;
use pdsno_types::entities::ControllerRole;
use pdsno_types::Id;

#[derive(Debug, Clone)]
pub struct PendingChallenge {
    pub challenge_id: Id,
    pub temp_id: String,
    pub role: ControllerRole,
    pub region: Option<String>,
    pub public_key: Vec<u8>,
    pub nonce: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Default)]
pub struct ChallengeStore {
    pending: DashMap<String, PendingChallenge>,
}

impl ChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, challenge: PendingChallenge) {
        self.pending.insert(challenge.challenge_id.clone(), challenge);
    }

    /// Remove and return the pending challenge, if any. Returns `None` both
    /// for an unknown id and for one already consumed by a prior call.
    pub fn take(&self, challenge_id: &str) -> Option<PendingChallenge> {
        self.pending.remove(challenge_id).map(|(_, v)| v)
    }

    pub fn gc_expired(&self, now: i64) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, c| c.expires_at > now);
        before - self.pending.len()
    }
}
