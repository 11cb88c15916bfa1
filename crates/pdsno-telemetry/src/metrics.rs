//! Prometheus metrics for PDSNO subsystems.
//!
//! Naming convention: `pdsno_<component>_<metric>_<unit>`. Grounded on
//! `quantum-telemetry::metrics`, using `once_cell::sync::Lazy` in place of
//! the teacher's `lazy_static!` macro (functionally equivalent; this
//! workspace does not otherwise depend on `lazy_static`).

use once_cell::sync::Lazy;
use prometheus::{Counter, CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// C1 NIB: optimistic-concurrency conflicts observed.
pub static NIB_CONFLICTS: Lazy<Counter> = Lazy::new(|| {
    let c = Counter::new(
        "pdsno_nib_conflicts_total",
        "Total optimistic-concurrency conflicts returned by upsert",
    )
    .expect("metric creation failed");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

/// C2 messaging: nonce cache fill ratio across all active caches, updated by
/// the transport layer (Open Question (b)).
pub static NONCE_CACHE_OCCUPANCY: Lazy<Gauge> = Lazy::new(|| {
    let g = Gauge::new(
        "pdsno_nonce_cache_occupancy_ratio",
        "Fraction of the nonce cache capacity currently in use",
    )
    .expect("metric creation failed");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

/// C2 messaging / C1 locks: a peer's request to acquire an already-held
/// resource. Surfaced as "lock contention" per spec §9 DESIGN NOTES'
/// metrics list.
pub static LOCK_CONTENTION: Lazy<Counter> = Lazy::new(|| {
    let c = Counter::new(
        "pdsno_lock_contention_total",
        "acquire_lock calls that found the resource already held by a live holder",
    )
    .expect("metric creation failed");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

/// Open Question (b): "cap it and emit a metric when capacity is
/// approached" — incremented (not just gauged) each time occupancy is
/// observed at or above 90% of capacity, so a dashboard can alert on rate
/// rather than only on point-in-time level.
pub static NONCE_CACHE_NEAR_CAPACITY: Lazy<Counter> = Lazy::new(|| {
    let c = Counter::new(
        "pdsno_nonce_cache_near_capacity_total",
        "Times the nonce cache was observed at or above 90% of its capacity",
    )
    .expect("metric creation failed");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

/// C4 admission: outcomes by named failure reason, plus "success".
pub static ADMISSION_OUTCOMES: Lazy<CounterVec> = Lazy::new(|| {
    let c = CounterVec::new(
        Opts::new(
            "pdsno_admission_outcomes_total",
            "Admission protocol outcomes by reason",
        ),
        &["reason"],
    )
    .expect("metric creation failed");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

/// C5 discovery: cycles completed, by region.
pub static DISCOVERY_CYCLES: Lazy<CounterVec> = Lazy::new(|| {
    let c = CounterVec::new(
        Opts::new("pdsno_discovery_cycles_total", "Discovery cycles completed"),
        &["region"],
    )
    .expect("metric creation failed");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

/// C5 discovery: wall-clock duration of `initialize+execute+finalize`, by
/// region.
pub static DISCOVERY_CYCLE_DURATION_SECS: Lazy<HistogramVec> = Lazy::new(|| {
    let h = HistogramVec::new(
        HistogramOpts::new(
            "pdsno_discovery_cycle_duration_seconds",
            "Discovery cycle wall-clock duration",
        ),
        &["region"],
    )
    .expect("metric creation failed");
    REGISTRY.register(Box::new(h.clone())).ok();
    h
});

/// C6 approval: requests by terminal state.
pub static APPROVAL_TERMINAL_STATES: Lazy<CounterVec> = Lazy::new(|| {
    let c = CounterVec::new(
        Opts::new(
            "pdsno_approval_terminal_states_total",
            "Configuration requests reaching a terminal state, by state",
        ),
        &["state"],
    )
    .expect("metric creation failed");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

/// C6 approval: wall-clock time from `proposed` to a terminal state, by
/// tier and classified sensitivity.
pub static APPROVAL_LATENCY_SECS: Lazy<HistogramVec> = Lazy::new(|| {
    let h = HistogramVec::new(
        HistogramOpts::new(
            "pdsno_approval_latency_seconds",
            "Time from a request's proposal to its terminal state",
        ),
        &["tier", "sensitivity"],
    )
    .expect("metric creation failed");
    REGISTRY.register(Box::new(h.clone())).ok();
    h
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_without_panicking() {
        NIB_CONFLICTS.inc();
        LOCK_CONTENTION.inc();
        NONCE_CACHE_OCCUPANCY.set(0.5);
        NONCE_CACHE_NEAR_CAPACITY.inc();
        ADMISSION_OUTCOMES.with_label_values(&["success"]).inc();
        DISCOVERY_CYCLES.with_label_values(&["zone-a"]).inc();
        DISCOVERY_CYCLE_DURATION_SECS
            .with_label_values(&["zone-a"])
            .observe(0.25);
        APPROVAL_TERMINAL_STATES
            .with_label_values(&["succeeded"])
            .inc();
        APPROVAL_LATENCY_SECS
            .with_label_values(&["regional", "low"])
            .observe(1.5);
    }
}
