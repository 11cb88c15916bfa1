//! Shared discovery data shapes (spec §4.5).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub mac: String,
    pub ip: String,
    pub hostname: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub probe_name: String,
    pub devices: Vec<DiscoveredDevice>,
    pub cancelled: bool,
}

/// Per-cycle delta against the previous device set (spec §4.5 "Delta
/// detection").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaSummary {
    pub new: Vec<String>,
    pub inactive: Vec<String>,
    pub updated: Vec<String>,
}

/// Two probes within the same LC cycle disagreed on the MAC/IP pairing for
/// a MAC (spec §4.5 "Orchestration": "may not silently overwrite a
/// differing mac/ip pair; conflicts produce a logged MAC_CONFLICT event").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeMergeConflict {
    pub mac: String,
    pub winning_probe: String,
    pub losing_probe: String,
}

/// A MAC observed with a differing MAC/IP pairing under a different LC
/// within the same cycle (spec §4.5 "MAC collision check").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacConflict {
    pub mac: String,
    pub existing_lc: String,
    pub incoming_lc: String,
}

/// The merged outcome of one discovery cycle, ready to become a
/// `DISCOVERY_REPORT` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub region: String,
    pub lc_id: String,
    pub devices: Vec<DiscoveredDevice>,
    pub delta: DeltaSummary,
    pub conflicts: Vec<MacConflict>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReportAck {
    pub region: String,
    pub lc_id: String,
    pub devices_upserted: usize,
    pub conflicts_recorded: usize,
}
