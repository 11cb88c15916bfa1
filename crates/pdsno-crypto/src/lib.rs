//! # PDSNO Crypto
//!
//! HMAC-SHA256 signing/verification, hashing helpers, nonce generation, and
//! per-peer-pair key management (spec §4.2 "Key management"). Grounded on
//! `shared-crypto`'s module split (`signatures`, `hashing`, `symmetric`).

pub mod asymmetric;
pub mod hashing;
pub mod keyring;
pub mod nonce;
pub mod signatures;

pub use asymmetric::{verify as ed25519_verify, Ed25519Error, KeyPair as Ed25519KeyPair};
pub use hashing::canonical_hash;
pub use keyring::{KeyRing, PeerSecret};
pub use nonce::generate_nonce;
pub use signatures::{hmac_sign, hmac_verify};
