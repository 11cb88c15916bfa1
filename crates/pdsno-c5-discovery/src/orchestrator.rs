//! Concurrent probe orchestration (spec §4.5 "Orchestration", §9 "Async
//! coordination in discovery": "model as a bounded worker pool fed by a
//! target-address queue... Cancellation is a broadcast signal observed at
//! queue-pop and result-send points"). `tokio::sync::Semaphore` bounds
//! concurrency; `tokio::sync::watch<bool>` is the cancellation broadcast,
//! grounded on the teacher's async-adapter-over-sync-domain split
//! (`node-runtime::adapters::peer_discovery`) generalized from one
//! fire-and-forget `spawn` to a joined, bounded pool.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::warn;

use crate::probe::{GuardedProbe, Probe, ProbeContext};
use crate::types::{DiscoveredDevice, ProbeMergeConflict, ProbeReport};

pub struct DiscoveryOrchestrator {
    max_concurrency: usize,
}

impl DiscoveryOrchestrator {
    pub fn new(max_concurrency: usize) -> Self {
        assert!(max_concurrency >= 1, "worker pool needs at least one slot");
        Self { max_concurrency }
    }

    /// Run every probe once, bounded by the worker pool, and merge their
    /// reports by MAC. `cancel` flips to `true` to request cooperative
    /// cancellation; probes still in `execute` observe it at their next
    /// suspension point via `finalize`'s `cancelled` flag.
    pub async fn run_cycle(
        &self,
        probes: Vec<Box<dyn Probe>>,
        context: ProbeContext,
        cancel: watch::Receiver<bool>,
    ) -> (Vec<DiscoveredDevice>, Vec<ProbeMergeConflict>, bool) {
        let started = std::time::Instant::now();
        let region = context.region.clone();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for probe in probes {
            let semaphore = semaphore.clone();
            let context = context.clone();
            let mut cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed during a cycle");
                run_probe(probe, &context, &mut cancel).await
            });
        }

        let mut reports = Vec::new();
        let mut any_cancelled = false;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    any_cancelled |= report.cancelled;
                    reports.push(report);
                }
                Err(err) => warn!(error = %err, "discovery probe task panicked"),
            }
        }

        let (devices, conflicts) = merge_reports(reports);

        pdsno_telemetry::metrics::DISCOVERY_CYCLES
            .with_label_values(&[&region])
            .inc();
        pdsno_telemetry::metrics::DISCOVERY_CYCLE_DURATION_SECS
            .with_label_values(&[&region])
            .observe(started.elapsed().as_secs_f64());

        (devices, conflicts, any_cancelled)
    }
}

async fn run_probe(
    probe: Box<dyn Probe>,
    context: &ProbeContext,
    cancel: &mut watch::Receiver<bool>,
) -> ProbeReport {
    let mut guarded = GuardedProbe::new(probe);
    guarded
        .initialize(context)
        .await
        .expect("orchestrator always initializes a fresh probe first");

    // Cancellation observed at the queue-pop-equivalent point: before the
    // (potentially long) execute phase starts.
    if *cancel.borrow() {
        return guarded
            .finalize(Vec::new(), true)
            .await
            .expect("initialize always precedes finalize here");
    }

    let raw = guarded
        .execute()
        .await
        .expect("orchestrator always executes right after initialize");

    // Observed again at the result-send-equivalent point: before finalize.
    let cancelled = *cancel.borrow();
    guarded
        .finalize(raw, cancelled)
        .await
        .expect("orchestrator always finalizes right after execute")
}

/// Merge every probe's devices by MAC (spec §4.5 "Orchestration"). A
/// differing IP under the same MAC is a conflict: the newer observation
/// wins for this cycle and the loser is retained only in the conflict
/// list (the caller turns that into a logged `MAC_CONFLICT` event).
/// Non-conflicting attributes from later probes are merged in.
fn merge_reports(reports: Vec<ProbeReport>) -> (Vec<DiscoveredDevice>, Vec<ProbeMergeConflict>) {
    let mut merged: HashMap<String, (DiscoveredDevice, String)> = HashMap::new();
    let mut conflicts = Vec::new();

    for report in reports {
        for device in report.devices {
            match merged.remove(&device.mac) {
                None => {
                    merged.insert(device.mac.clone(), (device, report.probe_name.clone()));
                }
                Some((existing, existing_probe)) if existing.ip == device.ip => {
                    let mut combined = existing;
                    combined.attributes.extend(device.attributes);
                    combined.hostname = device.hostname.or(combined.hostname);
                    merged.insert(combined.mac.clone(), (combined, report.probe_name.clone()));
                    let _ = existing_probe;
                }
                Some((existing, existing_probe)) => {
                    conflicts.push(ProbeMergeConflict {
                        mac: device.mac.clone(),
                        winning_probe: report.probe_name.clone(),
                        losing_probe: existing_probe,
                    });
                    let _ = existing;
                    merged.insert(device.mac.clone(), (device, report.probe_name.clone()));
                }
            }
        }
    }

    (merged.into_values().map(|(d, _)| d).collect(), conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::{arp::ArpProbe, icmp::IcmpProbe};
    use std::collections::BTreeMap;

    fn context() -> ProbeContext {
        ProbeContext {
            region: "zone-a".to_string(),
            controller_id: "lc1".to_string(),
            targets: vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
        }
    }

    #[tokio::test]
    async fn two_probes_merge_without_conflict() {
        let orchestrator = DiscoveryOrchestrator::new(2);
        let (_tx, rx) = watch::channel(false);
        let probes: Vec<Box<dyn Probe>> = vec![
            Box::new(ArpProbe::with_responses(vec![(
                "10.0.0.1".to_string(),
                "aa:bb:cc:00:00:01".to_string(),
            )])),
            Box::new(IcmpProbe::with_responses(vec![(
                "10.0.0.2".to_string(),
                "aa:bb:cc:00:00:02".to_string(),
            )])),
        ];
        let (devices, conflicts, cancelled) =
            orchestrator.run_cycle(probes, context(), rx.clone()).await;
        assert_eq!(devices.len(), 2);
        assert!(conflicts.is_empty());
        assert!(!cancelled);
        let _ = rx;
    }

    #[tokio::test]
    async fn conflicting_ip_for_the_same_mac_is_reported() {
        let orchestrator = DiscoveryOrchestrator::new(2);
        let (_tx, rx) = watch::channel(false);
        let arp_device = DiscoveredDevice {
            mac: "aa:bb:cc:00:00:01".to_string(),
            ip: "10.0.0.1".to_string(),
            hostname: None,
            attributes: BTreeMap::new(),
        };
        let mut icmp_device = arp_device.clone();
        icmp_device.ip = "10.0.0.99".to_string();
        let probes: Vec<Box<dyn Probe>> = vec![
            Box::new(ArpProbe::with_devices(vec![arp_device])),
            Box::new(IcmpProbe::with_devices(vec![icmp_device])),
        ];
        let (devices, conflicts, _cancelled) =
            orchestrator.run_cycle(probes, context(), rx).await;
        assert_eq!(devices.len(), 1);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].mac, "aa:bb:cc:00:00:01");
    }

    #[tokio::test]
    async fn pre_flipped_cancellation_yields_a_cancelled_report() {
        let orchestrator = DiscoveryOrchestrator::new(1);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let probes: Vec<Box<dyn Probe>> = vec![Box::new(ArpProbe::with_responses(vec![(
            "10.0.0.1".to_string(),
            "aa:bb:cc:00:00:01".to_string(),
        )]))];
        let (devices, _conflicts, cancelled) =
            orchestrator.run_cycle(probes, context(), rx).await;
        assert!(cancelled);
        assert!(devices.is_empty());
    }
}
