//! Fencing-token lock arithmetic, shared by every backend (spec §4.1
//! "acquire_lock / release_lock"). A lock is free to acquire when it has
//! never existed, is held by the same caller, or has expired; the fencing
//! token is monotonically increasing per resource so a stale holder's writes
//! can always be rejected downstream by comparing tokens.

use pdsno_types::{Id, Lock};

use crate::error::NibError;
use crate::outcomes::ReleaseOutcome;

pub fn is_expired(lock: &Lock, now: i64) -> bool {
    lock.expires_at <= now
}

/// Attempt to acquire `resource_key` for `holder_id`. `next_fencing_token`
/// is the backend's monotonic counter for this resource, already
/// incremented past any token ever issued for it.
pub fn try_acquire(
    existing: Option<&Lock>,
    resource_key: &Id,
    holder_id: &Id,
    now: i64,
    ttl_secs: i64,
    next_fencing_token: u64,
) -> Result<Lock, NibError> {
    if let Some(current) = existing {
        if current.holder_id != *holder_id && !is_expired(current, now) {
            pdsno_telemetry::metrics::LOCK_CONTENTION.inc();
            return Err(NibError::Locked {
                resource_key: resource_key.clone(),
                holder_id: current.holder_id.clone(),
            });
        }
    }
    Ok(Lock {
        resource_key: resource_key.clone(),
        holder_id: holder_id.clone(),
        acquired_at: now,
        expires_at: now + ttl_secs,
        fencing_token: next_fencing_token,
    })
}

/// Release requires the fencing token issued at acquisition, not the
/// holder id: "the old holder's subsequent release_lock fails with
/// stale_token. This prevents a slow holder from releasing a reacquired
/// lock" (spec §4.1). An expired lock is already free for the next
/// `acquire_lock`, so releasing it — even with a token that would
/// otherwise match — is stale, not a no-op success.
pub fn try_release(existing: Option<&Lock>, fencing_token: u64, now: i64) -> ReleaseOutcome {
    match existing {
        None => ReleaseOutcome::NotHeld,
        Some(lock) if is_expired(lock, now) => ReleaseOutcome::StaleToken,
        Some(lock) if lock.fencing_token == fencing_token => ReleaseOutcome::Released,
        Some(_) => ReleaseOutcome::StaleToken,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_resource_is_acquirable() {
        let lock = try_acquire(None, &"dev:1".to_string(), &"rc_a".to_string(), 100, 60, 1).unwrap();
        assert_eq!(lock.fencing_token, 1);
        assert_eq!(lock.expires_at, 160);
    }

    #[test]
    fn held_by_other_and_unexpired_is_rejected() {
        let current = Lock {
            resource_key: "dev:1".into(),
            holder_id: "rc_a".into(),
            acquired_at: 100,
            expires_at: 200,
            fencing_token: 5,
        };
        let result = try_acquire(
            Some(&current),
            &"dev:1".to_string(),
            &"rc_b".to_string(),
            150,
            60,
            6,
        );
        assert!(matches!(result, Err(NibError::Locked { .. })));
    }

    #[test]
    fn expired_lock_is_reacquirable_with_higher_token() {
        let current = Lock {
            resource_key: "dev:1".into(),
            holder_id: "rc_a".into(),
            acquired_at: 100,
            expires_at: 150,
            fencing_token: 5,
        };
        let lock = try_acquire(
            Some(&current),
            &"dev:1".to_string(),
            &"rc_b".to_string(),
            200,
            60,
            6,
        )
        .unwrap();
        assert_eq!(lock.holder_id, "rc_b");
        assert_eq!(lock.fencing_token, 6);
    }

    #[test]
    fn release_with_wrong_fencing_token_is_stale() {
        let current = Lock {
            resource_key: "dev:1".into(),
            holder_id: "rc_a".into(),
            acquired_at: 100,
            expires_at: 200,
            fencing_token: 1,
        };
        assert_eq!(try_release(Some(&current), 99, 150), ReleaseOutcome::StaleToken);
        assert_eq!(try_release(Some(&current), 1, 150), ReleaseOutcome::Released);
    }

    #[test]
    fn release_of_expired_lock_is_stale_even_with_matching_token() {
        let expired = Lock {
            resource_key: "dev:1".into(),
            holder_id: "rc_a".into(),
            acquired_at: 100,
            expires_at: 150,
            fencing_token: 1,
        };
        assert_eq!(try_release(Some(&expired), 1, 200), ReleaseOutcome::StaleToken);
    }

    #[test]
    fn release_of_absent_lock_is_not_held() {
        assert_eq!(try_release(None, 1, 200), ReleaseOutcome::NotHeld);
    }
}
