//! Process-level exclusive lock over the NIB's on-disk data directory,
//! distinct from the table-backed fencing lock in [`crate::lockfile`].
//! Grounded on `qc-02-block-storage::adapters::lock`.

mod guard;
mod security;

pub use guard::{DatabaseLock, LockError};
