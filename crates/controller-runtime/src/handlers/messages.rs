//! # Config/Policy Wire Payloads
//!
//! Typed payload shapes for the message types spec §6 names that don't
//! already have a struct in `pdsno-c6-approval`: that crate's
//! `ApprovalCoordinator` takes plain arguments so its state-machine logic
//! stays transport-free, the same split `pdsno-c4-admission::messages`
//! uses for the admission exchange.

use pdsno_types::entities::ConfigRequest;
use pdsno_types::DeviceExecutionResult;
use serde::{Deserialize, Serialize};

/// `CONFIG_PROPOSAL`: carries the request up the tier hierarchy. Every hop
/// re-evaluates it independently (spec §4.6 "Sensitivity classification...
/// is performed independently at each tier"), so the message also carries
/// the classification inputs the receiving tier needs rather than trusting
/// the sender's own classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigProposalMsg {
    pub request: ConfigRequest,
    /// The controller that should receive the eventual
    /// `CONFIG_APPROVAL`/`CONFIG_REJECTION`, regardless of how many tiers
    /// the proposal passes through on its way up (spec §4.6: "the request
    /// is still reported upward").
    pub origin_controller_id: String,
    pub payload_shape: String,
    pub device_roles: Vec<String>,
    pub blast_radius_bps: u32,
}

/// `CONFIG_APPROVAL`: sent directly to `origin_controller_id`, carrying the
/// approved request (with its `execution_token` set).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigApprovalMsg {
    pub request: ConfigRequest,
}

/// `CONFIG_REJECTION`: terminal, sent directly to `origin_controller_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRejectionMsg {
    pub request: ConfigRequest,
    pub reason: String,
}

/// `EXECUTION_REPORT`: the executing LC reports per-device results to the
/// tier that approved the request, so that tier's own record of the
/// request (and, on rollback failure, its degraded-device gate) stays in
/// sync (spec §4.6 "Execution", "Rollback").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReportMsg {
    pub request: ConfigRequest,
    pub results: Vec<DeviceExecutionResult>,
    pub rollback_attempted: bool,
    pub rollback_succeeded: bool,
}

/// `POLICY_UPDATE`: out of core scope to *author* (the operator does that),
/// but every tier must learn a new `policy_version` so spec §4.6's
/// `policy_drift` check has something current to compare against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyUpdateMsg {
    pub policy_version: u32,
}

/// `HEARTBEAT`: liveness only: see spec §4.3 ("at-most-once for
/// heartbeats"). Carries nothing beyond identity and a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatMsg {
    pub controller_id: String,
    pub sent_at: String,
}
