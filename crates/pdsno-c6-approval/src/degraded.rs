//! Degraded-device registry (spec §4.6 "Rollback": "If rollback itself
//! fails, the request enters `degraded`; no further configuration changes
//! are accepted for the affected devices until an operator clears the
//! state"). Grounded on `pdsno-c4-admission::blocklist::TempIdBlocklist`,
//! generalized from a TTL-bounded block to an operator-cleared-only one
//! (no TTL: spec.md names only an explicit clear, not an expiry).

use dashmap::DashMap;
use pdsno_types::Id;

#[derive(Debug, Default)]
pub struct DegradedDevices {
    entries: DashMap<Id, Id>,
}

impl DegradedDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `device_id` degraded as a result of `request_id`'s failed
    /// rollback.
    pub fn mark(&self, device_id: impl Into<Id>, request_id: impl Into<Id>) {
        self.entries.insert(device_id.into(), request_id.into());
    }

    pub fn is_degraded(&self, device_id: &str) -> bool {
        self.entries.contains_key(device_id)
    }

    pub fn any_degraded<'a>(&self, device_ids: impl IntoIterator<Item = &'a Id>) -> Option<Id> {
        device_ids
            .into_iter()
            .find(|id| self.is_degraded(id))
            .cloned()
    }

    /// Spec §4.6: "an operator clears the flag via a NIB write that emits a
    /// `DEGRADED_CLEARED` event" — the event write is the caller's job
    /// (it needs the operator id and a clock); this just lifts the gate.
    pub fn clear(&self, device_id: &str) -> bool {
        self.entries.remove(device_id).is_some()
    }
}
