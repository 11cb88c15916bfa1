//! Sensitivity classification (spec §4.6 "Sensitivity classification is
//! performed independently at each tier... a pure function of
//! `(payload_shape, target_devices, device_roles, blast_radius)` and a
//! tier-local `policy_version`"). Grounded on
//! `qc-08-consensus::domain::block_validation`'s pure-domain-service-over-a-
//! config shape: no I/O, a `Default`-backed config, one function per rule.

use pdsno_types::Sensitivity;

/// Devices touching more than this many targets in one request widen the
/// blast radius enough to force at least `High`.
pub const WIDE_TARGET_COUNT_THRESHOLD: usize = 25;

/// A classification's `blast_radius` (fraction of the region's devices
/// touched, in basis points) at or above this forces at least `High`.
pub const WIDE_BLAST_RADIUS_BPS: u32 = 2000;

fn base_sensitivity_for_shape(payload_shape: &str) -> Sensitivity {
    match payload_shape {
        "emergency_isolate" | "security_quarantine" => Sensitivity::Emergency,
        "firmware_upgrade" | "factory_reset" | "credential_rotation" => Sensitivity::High,
        "routing_change" | "interface_shutdown" => Sensitivity::Medium,
        "acl_update" | "vlan_tag" | "snmp_poll_interval" => Sensitivity::Low,
        _ => Sensitivity::Medium,
    }
}

/// Classify a proposed configuration change. Pure function: same inputs
/// always produce the same sensitivity, independent of any tier's local
/// state beyond the `device_roles`/`blast_radius` the caller supplies for
/// its own view of the target devices.
pub fn classify(
    payload_shape: &str,
    target_device_count: usize,
    device_roles: &[String],
    blast_radius_bps: u32,
) -> Sensitivity {
    let mut level = base_sensitivity_for_shape(payload_shape);

    if device_roles.iter().any(|role| role == "core" || role == "backbone") {
        level = level.max(Sensitivity::High);
    }

    if target_device_count >= WIDE_TARGET_COUNT_THRESHOLD || blast_radius_bps >= WIDE_BLAST_RADIUS_BPS {
        level = level.max(Sensitivity::High);
    }

    level
}

/// Spec §4.6: "If the LC's `policy_version` differs from the RC's, the
/// request is rejected with `policy_drift`."
pub fn policy_versions_match(request_policy_version: u32, local_policy_version: u32) -> bool {
    request_policy_version == local_policy_version
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acl_update_on_edge_devices_is_low() {
        let level = classify("acl_update", 3, &["edge".to_string()], 10);
        assert_eq!(level, Sensitivity::Low);
    }

    #[test]
    fn firmware_upgrade_is_high_regardless_of_scope() {
        let level = classify("firmware_upgrade", 1, &["edge".to_string()], 10);
        assert_eq!(level, Sensitivity::High);
    }

    #[test]
    fn core_device_role_escalates_a_low_shape_to_high() {
        let level = classify("acl_update", 1, &["core".to_string()], 10);
        assert_eq!(level, Sensitivity::High);
    }

    #[test]
    fn wide_blast_radius_escalates_a_low_shape_to_high() {
        let level = classify("acl_update", 2, &["edge".to_string()], 5000);
        assert_eq!(level, Sensitivity::High);
    }

    #[test]
    fn emergency_isolate_is_always_emergency() {
        let level = classify("emergency_isolate", 1, &["edge".to_string()], 0);
        assert_eq!(level, Sensitivity::Emergency);
    }

    #[test]
    fn matching_policy_versions_pass() {
        assert!(policy_versions_match(3, 3));
        assert!(!policy_versions_match(3, 4));
    }
}
