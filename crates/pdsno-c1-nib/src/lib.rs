//! # C1 — NIB Store
//!
//! Typed CRUD with optimistic concurrency on mutable entities, append-only
//! semantics for events, and advisory TTL-bounded locks with fencing tokens
//! (spec §4.1). Grounded on `qc-02-block-storage` (storage/lock/checksum
//! layering) and `qc-04-state-management` (versioned-record pattern).

pub mod backend;
pub mod cas;
pub mod checksum;
pub mod error;
pub mod filelock;
pub mod filters;
pub mod lockfile;
pub mod outcomes;
pub mod schema;
pub mod store;

pub use backend::memory::MemoryNib;
pub use backend::rocks::{RocksNib, RocksNibConfig};
pub use error::NibError;
pub use filelock::{DatabaseLock, LockError as FileLockError};
pub use filters::{ConfigRequestFilter, ControllerFilter, DeviceFilter};
pub use outcomes::{LockOutcome, ReleaseOutcome, UpsertOutcome};
pub use store::{NibStore, Write, WriteResult};
