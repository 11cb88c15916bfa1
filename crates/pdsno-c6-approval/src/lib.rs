//! # C6 — Approval Engine
//!
//! Sensitivity classification, tier routing, single-use execution tokens,
//! conflict detection, and the `proposed → ... → succeeded|rejected` state
//! machine (spec §4.6).

pub mod classification;
pub mod coordinator;
pub mod degraded;
pub mod errors;
pub mod routing;
pub mod token;

pub use classification::classify;
pub use coordinator::{ApprovalConfig, ApprovalCoordinator};
pub use degraded::DegradedDevices;
pub use errors::ApprovalError;
pub use routing::{route, RoutingOutcome, Tier};
