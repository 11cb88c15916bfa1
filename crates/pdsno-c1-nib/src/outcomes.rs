//! Result payloads distinguishing "new state" from "the reason it refused"
//! (spec §4.1: "every mutating call returns a result carrying either the new
//! version number or a tagged failure").

use pdsno_types::Lock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub version: u64,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LockOutcome {
    pub lock: Lock,
}

/// Spec §4.1: `release_lock(resource_key, fencing_token) -> {ok} | {not_held}
/// | {stale_token}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The fencing token matched a live lock; it is now free.
    Released,
    /// No lock (or an already-removed one) exists for the resource.
    NotHeld,
    /// A lock exists but either the token doesn't match its current fencing
    /// token, or it has expired — in both cases the caller is not the
    /// resource's current holder.
    StaleToken,
}
