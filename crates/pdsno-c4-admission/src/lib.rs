//! # C4 — Admission Protocol
//!
//! The six-step VALIDATION_REQUEST → CHALLENGE → CHALLENGE_RESPONSE →
//! VALIDATION_RESULT exchange a candidate controller uses to join its
//! parent's network (spec §4.4). Grounded on
//! `qc-01-peer-discovery::ipc::bootstrap`'s stage-then-verify flow,
//! generalized from proof-of-work gating to bootstrap-token + asymmetric
//! challenge/response gating, and on `shared-crypto::signatures` for the
//! ed25519 challenge-response primitive (re-exposed from `pdsno-crypto`).

pub mod blocklist;
pub mod bootstrap_token;
pub mod challenge;
pub mod coordinator;
pub mod credential;
pub mod errors;
pub mod messages;
pub mod sequence;

pub use blocklist::TempIdBlocklist;
pub use challenge::{ChallengeStore, PendingChallenge};
pub use coordinator::{AdmissionConfig, AdmissionCoordinator, FRESHNESS_WINDOW_SECS};
pub use credential::DelegationCredential;
pub use errors::AdmissionError;
pub use messages::{Challenge, ChallengeResponse, ValidationRequest, ValidationResult};
pub use sequence::AssignedIdSequencer;
