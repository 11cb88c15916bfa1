//! # PDSNO Shared Types
//!
//! Domain entities, the signed-envelope wire shape, and the message-type
//! catalog shared across every PDSNO subsystem crate.
//!
//! ## Design Principles
//!
//! - **Single source of truth**: every cross-component type lives here.
//! - **Envelope integrity**: `Envelope<T>` is the sole wrapper for
//!   inter-controller communication; nothing is sent unsigned.

pub mod catalog;
pub mod entities;
pub mod envelope;
pub mod errors;

pub use catalog::{MessageType, Retriable};
pub use entities::*;
pub use envelope::Envelope;
pub use errors::*;
