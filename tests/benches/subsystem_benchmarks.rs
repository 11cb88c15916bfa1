//! Performance validation for the throughput-sensitive paths across the
//! control tiers: NIB writes and fencing locks, envelope sign/verify,
//! bootstrap token computation, discovery delta detection, and sensitivity
//! classification.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pdsno_c1_nib::{MemoryNib, NibStore};
use pdsno_c2_messaging::sign_envelope;
use pdsno_c4_admission::bootstrap_token;
use pdsno_c5_discovery::DeltaTracker;
use pdsno_types::entities::{ControllerRole, Device, DeviceStatus, Sensitivity};
use pdsno_types::envelope::Destination;
use rand::Rng;
use std::time::Duration;

// ============================================================================
// C1: NIB Benchmarks
// Optimistic-concurrency upsert and fencing-lock acquire/release.
// ============================================================================

fn device(id: usize) -> Device {
    Device {
        device_id: format!("dev_zone-a_{id:08x}"),
        region: "zone-a".to_string(),
        mac: format!("aa:bb:cc:{:02x}:{:02x}:{:02x}", id & 0xff, (id >> 8) & 0xff, (id >> 16) & 0xff),
        ip: format!("10.0.{}.{}", (id >> 8) & 0xff, id & 0xff),
        hostname: None,
        status: DeviceStatus::Quarantined,
        last_seen_by: "lc1".to_string(),
        last_seen_at: 1000,
        version: 0,
        attributes: Default::default(),
    }
}

fn bench_nib_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("pdsno-c1-nib-upsert");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("upsert_device_create", |b| {
        let nib = MemoryNib::new();
        let mut next_id = 0usize;
        b.iter(|| {
            next_id += 1;
            black_box(nib.upsert_device(device(next_id), None).unwrap())
        })
    });

    let counts = [100, 1_000, 10_000];
    for count in counts {
        let nib = MemoryNib::new();
        for i in 0..count {
            nib.upsert_device(device(i), None).unwrap();
        }
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("get_device_after_n_inserted", count), &nib, |b, nib| {
            b.iter(|| black_box(nib.get_device(&device(count / 2).device_id).unwrap()))
        });
    }

    group.finish();
}

fn bench_nib_locks(c: &mut Criterion) {
    let mut group = c.benchmark_group("pdsno-c1-nib-locks");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("acquire_then_release_uncontended", |b| {
        let nib = MemoryNib::new();
        let mut now = 0i64;
        b.iter(|| {
            now += 1;
            let outcome = nib.acquire_lock(&"device:bench".to_string(), &"holder".to_string(), now, 30).unwrap();
            black_box(nib.release_lock(&"device:bench".to_string(), outcome.lock.fencing_token, now).unwrap())
        })
    });

    group.finish();
}

// ============================================================================
// C2: Messaging Benchmarks
// Envelope signing and the full verify pipeline (structural, freshness,
// replay, HMAC, sender check).
// ============================================================================

fn bench_envelope_sign_and_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("pdsno-c2-messaging-envelope");
    group.measurement_time(Duration::from_secs(10));
    let secret = b"shared-secret-material-32-bytes!".to_vec();

    group.bench_function("sign_envelope", |b| {
        b.iter(|| {
            black_box(sign_envelope(
                "lc1",
                Destination::Controller("rc1".to_string()),
                "HEARTBEAT",
                serde_json::json!({"n": 1}),
                &secret,
            ))
        })
    });

    group.bench_function("verify_fresh_envelope", |b| {
        let mut authenticator = pdsno_c2_messaging::Authenticator::new(secret.clone());
        b.iter(|| {
            let envelope = sign_envelope(
                "lc1",
                Destination::Controller("rc1".to_string()),
                "HEARTBEAT",
                serde_json::json!({"n": 1}),
                &secret,
            );
            black_box(authenticator.verify(&envelope, Some("lc1")))
        })
    });

    group.finish();
}

// ============================================================================
// C4: Admission Benchmarks
// Bootstrap token compute/verify — on the hot path of every admission
// attempt a parent controller handles.
// ============================================================================

fn bench_bootstrap_token(c: &mut Criterion) {
    let mut group = c.benchmark_group("pdsno-c4-admission-bootstrap-token");
    group.measurement_time(Duration::from_secs(10));
    let secret = b"bootstrap-shared-secret-material".to_vec();

    group.bench_function("compute", |b| {
        b.iter(|| {
            black_box(bootstrap_token::compute(
                "temp_lc9",
                Some("zone-a"),
                ControllerRole::Local,
                &secret,
            ))
        })
    });

    group.bench_function("verify", |b| {
        let token = bootstrap_token::compute("temp_lc9", Some("zone-a"), ControllerRole::Local, &secret);
        b.iter(|| {
            black_box(bootstrap_token::verify(
                &token,
                "temp_lc9",
                Some("zone-a"),
                ControllerRole::Local,
                &secret,
            ))
        })
    });

    group.finish();
}

// ============================================================================
// C5: Discovery Benchmarks
// Per-cycle delta detection against a previous device set, at region sizes
// from a handful of devices to a large deployment.
// ============================================================================

fn bench_discovery_delta(c: &mut Criterion) {
    use std::collections::BTreeMap;

    let mut group = c.benchmark_group("pdsno-c5-discovery-delta");
    group.measurement_time(Duration::from_secs(10));

    fn discovered(mac_index: usize) -> pdsno_c5_discovery::DiscoveredDevice {
        pdsno_c5_discovery::DiscoveredDevice {
            mac: format!("aa:bb:cc:{:06x}", mac_index),
            ip: format!("10.0.{}.{}", (mac_index >> 8) & 0xff, mac_index & 0xff),
            hostname: None,
            attributes: BTreeMap::new(),
        }
    }

    let region_sizes = [100, 1_000, 10_000];
    for size in region_sizes {
        let baseline: Vec<_> = (0..size).map(discovered).collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("steady_state_cycle", size), &baseline, |b, baseline| {
            let mut tracker = DeltaTracker::default();
            tracker.observe_cycle(baseline);
            let mut rng = rand::thread_rng();
            b.iter(|| {
                // A handful of attribute changes, same membership otherwise —
                // the common case once a region has settled.
                let mut cycle = baseline.clone();
                let touch = rng.gen_range(0..cycle.len());
                cycle[touch].hostname = Some(format!("host-{touch}"));
                black_box(tracker.observe_cycle(&cycle))
            })
        });
    }

    group.finish();
}

// ============================================================================
// C6: Approval Benchmarks
// Sensitivity classification — a pure function evaluated on every proposed
// configuration change at every tier that sees it.
// ============================================================================

fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("pdsno-c6-approval-classification");
    group.measurement_time(Duration::from_secs(10));

    let roles = vec!["edge".to_string()];
    group.bench_function("classify_low_sensitivity_shape", |b| {
        b.iter(|| black_box(pdsno_c6_approval::classify("acl_update", 1, &roles, 10)))
    });

    let core_roles = vec!["core".to_string()];
    group.bench_function("classify_core_role_escalation", |b| {
        b.iter(|| black_box(pdsno_c6_approval::classify("acl_update", 1, &core_roles, 10)))
    });

    group.bench_function("route_every_tier_sensitivity_pair", |b| {
        use pdsno_c6_approval::Tier;
        let tiers = [Tier::Local, Tier::Regional, Tier::Global];
        let sensitivities = [
            Sensitivity::Low,
            Sensitivity::Medium,
            Sensitivity::High,
            Sensitivity::Emergency,
        ];
        b.iter(|| {
            for tier in tiers {
                for sensitivity in sensitivities {
                    black_box(pdsno_c6_approval::route(tier, sensitivity));
                }
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_nib_upsert,
    bench_nib_locks,
    bench_envelope_sign_and_verify,
    bench_bootstrap_token,
    bench_discovery_delta,
    bench_classification,
);

criterion_main!(benches);
