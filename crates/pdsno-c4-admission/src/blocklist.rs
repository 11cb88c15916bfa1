//! `temp_id` blocklist (spec §4.4 step 2). Grounded on
//! `qc-01-peer-discovery::domain::routing_table::banned::BannedPeers`,
//! generalized from node-id/IP banning to `temp_id` banning and made
//! concurrency-safe since admission handling runs on shared async state.

use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct TempIdBlocklist {
    entries: DashMap<String, i64>,
}

impl TempIdBlocklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&self, temp_id: impl Into<String>, until: i64) {
        self.entries.insert(temp_id.into(), until);
    }

    pub fn is_blocked(&self, temp_id: &str, now: i64) -> bool {
        self.entries
            .get(temp_id)
            .is_some_and(|until| *until > now)
    }

    pub fn gc_expired(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, until| *until > now);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_temp_id_reports_blocked_until_expiry() {
        let blocklist = TempIdBlocklist::new();
        blocklist.block("temp-rc-a", 1000);
        assert!(blocklist.is_blocked("temp-rc-a", 500));
        assert!(!blocklist.is_blocked("temp-rc-a", 1500));
    }

    #[test]
    fn unknown_temp_id_is_not_blocked() {
        let blocklist = TempIdBlocklist::new();
        assert!(!blocklist.is_blocked("ghost", 0));
    }

    #[test]
    fn gc_expired_removes_only_lapsed_entries() {
        let blocklist = TempIdBlocklist::new();
        blocklist.block("a", 100);
        blocklist.block("b", 2000);
        let removed = blocklist.gc_expired(500);
        assert_eq!(removed, 1);
        assert!(!blocklist.is_blocked("a", 500));
        assert!(blocklist.is_blocked("b", 500));
    }
}
