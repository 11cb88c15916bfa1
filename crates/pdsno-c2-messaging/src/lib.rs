//! # C2 — Message Envelope & Authenticator
//!
//! Canonical wire format, HMAC signing, and the nonce+timestamp replay
//! defense pipeline (spec §4.2). Grounded on
//! `qc-02-block-storage/ipc/envelope`, generalized from a fixed-field,
//! subsystem-numbered envelope to the spec's named-field, string-id
//! envelope.

pub mod authenticator;
pub mod errors;
pub mod sign;

pub use authenticator::Authenticator;
pub use errors::VerifyError;
pub use sign::sign_envelope;
