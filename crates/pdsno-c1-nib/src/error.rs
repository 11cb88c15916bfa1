//! Failure taxonomy for NIB operations (spec §4.1, §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NibError {
    /// Optimistic concurrency conflict: the caller's `expected_version` no
    /// longer matches the stored record.
    #[error("version conflict on {kind} {id}: expected {expected}, found {actual}")]
    Conflict {
        kind: &'static str,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// No record exists at the given key.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// The caller's write would violate an invariant enforced at the store
    /// boundary (malformed key, unknown enum discriminant from disk, etc).
    #[error("invalid {kind} record: {reason}")]
    Invalid { kind: &'static str, reason: String },

    /// Resource is currently locked by a different holder.
    #[error("resource {resource_key} is held by {holder_id}")]
    Locked {
        resource_key: String,
        holder_id: String,
    },

    /// Backing store unavailable (disk I/O failure, poisoned lock, corrupt
    /// record checksum).
    #[error("nib backend unavailable: {0}")]
    Unavailable(String),
}

impl NibError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        NibError::NotFound {
            kind,
            id: id.into(),
        }
    }
}
