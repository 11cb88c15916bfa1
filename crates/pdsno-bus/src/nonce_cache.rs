//! Bounded, time-evicting nonce cache (spec §4.2 "Nonce store", Open
//! Question (b)). Grounded on `shared-bus::nonce_cache::TimeBoundedNonceCache`,
//! generalized from a `u64`-nonce blockchain IPC scheme to the spec's
//! base64-string nonce and made explicitly capacity-bounded per the Open
//! Question resolution recorded in SPEC_FULL.md §9(b).

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NonceError {
    #[error("nonce already seen within the freshness window")]
    Replay,
}

/// A nonce cache bounded by both a time window and an entry-count cap.
///
/// Entries older than `freshness_window_secs` are safe to evict because step
/// 2 of envelope verification (spec §4.2) would reject them as stale anyway.
/// The entry cap is a defensive backstop against unbounded growth under
/// sustained traffic (Open Question (b): "cap it and emit a metric when
/// capacity is approached").
pub struct NonceCache {
    seen: HashMap<String, i64>,
    freshness_window_secs: i64,
    max_entries: usize,
    last_sweep: i64,
    sweep_interval_secs: i64,
}

/// Default cap, matching the teacher's `MAX_NONCE_CACHE_SIZE`.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

impl NonceCache {
    pub fn new(freshness_window_secs: i64) -> Self {
        Self::with_capacity(freshness_window_secs, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(freshness_window_secs: i64, max_entries: usize) -> Self {
        Self {
            seen: HashMap::new(),
            freshness_window_secs,
            max_entries,
            last_sweep: 0,
            sweep_interval_secs: freshness_window_secs.max(1),
        }
    }

    /// Record `nonce` as seen at `now` if it has not been seen before within
    /// the freshness window. Returns `NonceError::Replay` otherwise.
    pub fn check_and_record(&mut self, nonce: &str, now: i64) -> Result<(), NonceError> {
        self.sweep(now);
        if self.seen.contains_key(nonce) {
            return Err(NonceError::Replay);
        }
        self.seen.insert(nonce.to_string(), now);
        Ok(())
    }

    /// Fraction of `max_entries` currently occupied, in `[0.0, 1.0]`. The
    /// caller (the messaging/transport layer) emits a metric when this
    /// crosses 0.9 per SPEC_FULL.md §9(b).
    pub fn occupancy(&self) -> f64 {
        self.seen.len() as f64 / self.max_entries as f64
    }

    fn sweep(&mut self, now: i64) {
        let due_for_time_sweep = now - self.last_sweep >= self.sweep_interval_secs;
        let over_capacity = self.seen.len() >= self.max_entries;
        if !due_for_time_sweep && !over_capacity {
            return;
        }
        self.last_sweep = now;
        let cutoff = now - self.freshness_window_secs;
        self.seen.retain(|_, seen_at| *seen_at >= cutoff);

        // If still at or over capacity after a time-based sweep (pathological
        // burst), drop the oldest entries to leave room for the insert this
        // sweep is guarding, rather than let the map grow unbounded.
        if self.seen.len() >= self.max_entries {
            let mut entries: Vec<(String, i64)> =
                self.seen.iter().map(|(k, v)| (k.clone(), *v)).collect();
            entries.sort_by_key(|(_, t)| *t);
            let overflow = self.seen.len() + 1 - self.max_entries;
            for (k, _) in entries.into_iter().take(overflow) {
                self.seen.remove(&k);
            }
        }
    }
}
