//! Per-cycle delta computation with k-cycle damping (spec §4.5 "Delta
//! detection"): `new = C − P`, `inactive = P − C`, `updated = { d ∈ P∩C |
//! attributes_changed(d) }`, where a device only drops to `inactive` after
//! `k` consecutive cycles of absence (default `k = 2`) to damp probe
//! flakiness. Pure logic, no I/O — the orchestrator feeds it one cycle's
//! merged device set at a time.

use std::collections::HashMap;

use crate::types::{DeltaSummary, DiscoveredDevice};

pub const DEFAULT_DAMPING_CYCLES: u32 = 2;

pub struct DeltaTracker {
    k: u32,
    present: HashMap<String, DiscoveredDevice>,
    miss_streak: HashMap<String, u32>,
}

impl DeltaTracker {
    pub fn new(k: u32) -> Self {
        assert!(k >= 1, "damping threshold must be at least one cycle");
        Self {
            k,
            present: HashMap::new(),
            miss_streak: HashMap::new(),
        }
    }

    fn attributes_changed(previous: &DiscoveredDevice, current: &DiscoveredDevice) -> bool {
        previous.ip != current.ip
            || previous.hostname != current.hostname
            || previous.attributes != current.attributes
    }

    /// Fold in one cycle's merged device set, returning the delta against
    /// everything still considered present (i.e. not yet damped out).
    pub fn observe_cycle(&mut self, current: &[DiscoveredDevice]) -> DeltaSummary {
        let mut seen_this_cycle = std::collections::HashSet::new();
        let mut new = Vec::new();
        let mut updated = Vec::new();

        for device in current {
            seen_this_cycle.insert(device.mac.clone());
            self.miss_streak.remove(&device.mac);
            match self.present.get(&device.mac) {
                None => new.push(device.mac.clone()),
                Some(previous) if Self::attributes_changed(previous, device) => {
                    updated.push(device.mac.clone())
                }
                Some(_) => {}
            }
            self.present.insert(device.mac.clone(), device.clone());
        }

        let missing: Vec<String> = self
            .present
            .keys()
            .filter(|mac| !seen_this_cycle.contains(*mac))
            .cloned()
            .collect();

        let mut inactive = Vec::new();
        for mac in missing {
            let streak = self.miss_streak.entry(mac.clone()).or_insert(0);
            *streak += 1;
            if *streak >= self.k {
                inactive.push(mac.clone());
            }
        }
        for mac in &inactive {
            self.present.remove(mac);
            self.miss_streak.remove(mac);
        }

        new.sort();
        inactive.sort();
        updated.sort();
        DeltaSummary { new, inactive, updated }
    }
}

impl Default for DeltaTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DAMPING_CYCLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn device(mac: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            mac: mac.to_string(),
            ip: format!("10.0.0.{mac}"),
            hostname: None,
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn first_cycle_reports_every_device_as_new() {
        let mut tracker = DeltaTracker::default();
        let delta = tracker.observe_cycle(&[device("A"), device("B"), device("C")]);
        assert_eq!(delta.new, vec!["A", "B", "C"]);
        assert!(delta.inactive.is_empty());
    }

    #[test]
    fn single_cycle_absence_is_damped_with_default_k() {
        let mut tracker = DeltaTracker::default();
        tracker.observe_cycle(&[device("A"), device("B"), device("C")]);
        let delta = tracker.observe_cycle(&[device("B"), device("C"), device("D")]);
        assert_eq!(delta.new, vec!["D"]);
        assert!(delta.inactive.is_empty(), "A absent only once must not yet be inactive");
    }

    #[test]
    fn second_consecutive_absence_crosses_the_damping_threshold() {
        let mut tracker = DeltaTracker::default();
        tracker.observe_cycle(&[device("A"), device("B"), device("C")]);
        tracker.observe_cycle(&[device("B"), device("C"), device("D")]);
        let delta = tracker.observe_cycle(&[device("C"), device("D")]);
        assert_eq!(delta.inactive, vec!["A"]);
        assert!(delta.new.is_empty());
    }

    #[test]
    fn attribute_change_on_a_present_device_is_reported_as_updated() {
        let mut tracker = DeltaTracker::default();
        tracker.observe_cycle(&[device("A")]);
        let mut changed = device("A");
        changed.hostname = Some("renamed".to_string());
        let delta = tracker.observe_cycle(&[changed]);
        assert_eq!(delta.updated, vec!["A"]);
        assert!(delta.new.is_empty());
    }

    #[test]
    fn device_reappearing_after_damped_removal_is_new_again() {
        let mut tracker = DeltaTracker::default();
        tracker.observe_cycle(&[device("A")]);
        tracker.observe_cycle(&[]);
        tracker.observe_cycle(&[]); // A damps out here (k=2)
        let delta = tracker.observe_cycle(&[device("A")]);
        assert_eq!(delta.new, vec!["A"]);
    }
}
