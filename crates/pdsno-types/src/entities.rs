//! # Core Domain Entities
//!
//! Mirrors spec §3 (Data Model). Every mutable entity carries a monotonic
//! `version` for optimistic concurrency in the NIB (C1).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Printable identifier used for every entity key in the system.
pub type Id = String;

// =============================================================================
// DEVICE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Discovered,
    Quarantined,
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: Id,
    pub region: Id,
    pub mac: String,
    pub ip: String,
    pub hostname: Option<String>,
    pub status: DeviceStatus,
    pub last_seen_by: Id,
    pub last_seen_at: i64,
    pub version: u64,
    pub attributes: BTreeMap<String, String>,
}

// =============================================================================
// CONTROLLER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerRole {
    Global,
    Regional,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerStatus {
    Pending,
    Active,
    Revoked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub controller_id: Id,
    pub role: ControllerRole,
    pub region: Option<Id>,
    pub status: ControllerStatus,
    pub validated_by: Id,
    pub validated_at: i64,
    pub public_key: Vec<u8>,
    pub certificate: Vec<u8>,
    pub capabilities: Vec<String>,
    pub version: u64,
}

// =============================================================================
// CONFIG REQUEST
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, PartialOrd, Ord)]
pub enum Sensitivity {
    Low,
    Medium,
    High,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Proposed,
    PendingRegional,
    PendingGlobal,
    PendingConflict,
    Approved,
    Executing,
    Succeeded,
    Failed,
    RolledBack,
    Rejected,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: RequestState,
    pub to: RequestState,
    pub at: i64,
    pub actor_id: Id,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub request_id: Id,
    pub config_hash: String,
    pub payload: serde_json::Value,
    pub target_devices: Vec<Id>,
    pub declared_sensitivity: Sensitivity,
    pub classified_sensitivity: Option<Sensitivity>,
    pub policy_version: u32,
    pub state: RequestState,
    pub created_by: Id,
    pub approvers: Vec<Id>,
    pub execution_token: Option<Id>,
    pub audit_trail: Vec<StateTransition>,
    pub version: u64,
}

// =============================================================================
// EXECUTION TOKEN
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenConstraints {
    pub max_rate_per_minute: Option<u32>,
    pub not_before: Option<i64>,
    pub not_after: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionToken {
    pub token_id: Id,
    pub request_id: Id,
    pub config_hash: String,
    pub scope: Vec<Id>,
    pub issuer_id: Id,
    pub issued_at: i64,
    pub expires_at: i64,
    pub max_uses: u32,
    pub consumed_at: Option<i64>,
    pub constraints: TokenConstraints,
    pub signature: Vec<u8>,
}

// =============================================================================
// EVENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Id,
    pub event_type: String,
    pub actor_id: Id,
    pub timestamp: i64,
    pub payload: serde_json::Value,
    pub hmac: Option<Vec<u8>>,
}

// =============================================================================
// LOCK
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lock {
    pub resource_key: Id,
    pub holder_id: Id,
    pub acquired_at: i64,
    pub expires_at: i64,
    pub fencing_token: u64,
}

/// Per-device execution result recorded on partial failure (spec §4.6
/// "Execution"). Kept alongside the entities it is produced by rather than
/// inside the approval engine crate, since the NIB persists it as part of a
/// `ConfigRequest`'s audit payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceExecutionResult {
    pub device_id: Id,
    pub succeeded: bool,
    pub detail: Option<String>,
}
