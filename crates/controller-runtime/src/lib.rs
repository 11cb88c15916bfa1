//! # Controller Runtime Library
//!
//! Exposes the process's internal modules for the binary in `main.rs` and
//! for integration tests. A controller process is one of the three tiers
//! (Global / Regional / Local); `config::ControllerConfig` picks the tier
//! and `container::ControllerContainer` wires the C1-C6 crates accordingly.

pub mod config;
pub mod container;
pub mod handlers;
pub mod wiring;
