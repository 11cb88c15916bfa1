//! # C5 — Discovery
//!
//! The three-phase probe lifecycle, bounded concurrent orchestration,
//! k-cycle damped delta detection, graduation policy, and the
//! `DISCOVERY_REPORT` / `DISCOVERY_REPORT_ACK` exchange between an LC and
//! its RC (spec §4.5).

pub mod delta;
pub mod errors;
pub mod graduation;
pub mod orchestrator;
pub mod probe;
pub mod probes;
pub mod report;
pub mod types;

pub use delta::{DeltaTracker, DEFAULT_DAMPING_CYCLES};
pub use errors::DiscoveryError;
pub use graduation::{GraduationPolicy, NoAutoGraduation};
pub use orchestrator::DiscoveryOrchestrator;
pub use probe::{GuardedProbe, Probe, ProbeContext};
pub use report::{build_report, RegionalDiscoveryProcessor};
pub use types::{
    DeltaSummary, DiscoveredDevice, DiscoveryReport, DiscoveryReportAck, MacConflict, ProbeMergeConflict,
    ProbeReport,
};
