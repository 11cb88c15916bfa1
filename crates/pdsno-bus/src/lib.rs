//! # PDSNO Bus
//!
//! The in-process fallback transport (spec §4.3 "In-process bus") plus the
//! bounded, time-evicting nonce cache (spec §4.2 "Nonce store") shared by
//! every transport that verifies envelopes. Grounded on `shared-bus`.

pub mod nonce_cache;
pub mod registry;
pub mod topic;

pub use nonce_cache::{NonceCache, NonceError};
pub use registry::{DispatchError, InProcessBus};
pub use topic::topic_matches;
