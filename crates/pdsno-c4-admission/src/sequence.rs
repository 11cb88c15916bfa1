//! Monotonic per-(role, region) `assigned_id` allocation (spec §4.4
//! "Identity allocation": `<role>_cntl_<region?>_<seq>`). Grounded on the
//! teacher's `AtomicU64`-per-key counter pattern (`shared-bus::publisher`'s
//! sequence numbers).

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use pdsno_types::entities::ControllerRole;

fn role_tag(role: ControllerRole) -> &'static str {
    match role {
        ControllerRole::Global => "global",
        ControllerRole::Regional => "regional",
        ControllerRole::Local => "local",
    }
}

#[derive(Debug, Default)]
pub struct AssignedIdSequencer {
    counters: DashMap<String, AtomicU64>,
}

impl AssignedIdSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_assigned_id(&self, role: ControllerRole, region: Option<&str>) -> String {
        let tag = role_tag(role);
        let key = format!("{tag}|{}", region.unwrap_or(""));
        let counter = self
            .counters
            .entry(key)
            .or_insert_with(|| AtomicU64::new(0));
        let seq = counter.fetch_add(1, Ordering::SeqCst) + 1;
        match region {
            Some(region) => format!("{tag}_cntl_{region}_{seq}"),
            None => format!("{tag}_cntl_{seq}"),
        }
    }
}
