//! `DISCOVERY_REPORT` construction and RC-side processing (spec §4.5
//! "Reporting", "MAC collision check"): the LC folds a cycle's merge and
//! delta into a report; the RC upserts devices through the NIB with
//! `expected_version`, checks MAC uniqueness within its region across LCs,
//! and acks.

use std::sync::Arc;

use pdsno_c1_nib::{filters::DeviceFilter, NibStore};
use pdsno_types::entities::{Device, DeviceStatus, Event};
use tracing::warn;
use uuid::Uuid;

use crate::types::{DeltaSummary, DiscoveredDevice, DiscoveryReport, DiscoveryReportAck, MacConflict, ProbeMergeConflict};

/// Build the LC-side report from one cycle's merge and delta outputs.
pub fn build_report(
    region: String,
    lc_id: String,
    devices: Vec<DiscoveredDevice>,
    delta: DeltaSummary,
    merge_conflicts: Vec<ProbeMergeConflict>,
    cancelled: bool,
) -> DiscoveryReport {
    let conflicts = merge_conflicts
        .into_iter()
        .map(|c| MacConflict {
            mac: c.mac,
            existing_lc: c.losing_probe,
            incoming_lc: c.winning_probe,
        })
        .collect();
    DiscoveryReport {
        region,
        lc_id,
        devices,
        delta,
        conflicts,
        cancelled,
    }
}

fn device_id_for(region: &str, mac: &str) -> String {
    format!("dev_{region}_{}", mac.replace([':', '-'], ""))
}

pub struct RegionalDiscoveryProcessor {
    nib: Arc<dyn NibStore>,
}

impl RegionalDiscoveryProcessor {
    pub fn new(nib: Arc<dyn NibStore>) -> Self {
        Self { nib }
    }

    /// Upsert every reported device, check MAC uniqueness across LCs in the
    /// region, and record a `MAC_CONFLICT` event for every collision
    /// (either from the LC's own probe merge or newly discovered here).
    pub fn process_report(
        &self,
        report: &DiscoveryReport,
        now: i64,
    ) -> Result<DiscoveryReportAck, pdsno_c1_nib::NibError> {
        let mut devices_upserted = 0;
        let mut conflicts_recorded = 0;

        let existing_in_region = self.nib.query_devices(&DeviceFilter {
            region: Some(report.region.clone()),
            ..Default::default()
        })?;

        for observed in &report.devices {
            let device_id = device_id_for(&report.region, &observed.mac);

            if let Some(collision) = existing_in_region
                .iter()
                .find(|d| d.mac == observed.mac && d.device_id != device_id && d.last_seen_by != report.lc_id)
            {
                self.nib.append_event(Event {
                    event_id: Uuid::new_v4().to_string(),
                    event_type: "MAC_CONFLICT".to_string(),
                    actor_id: report.lc_id.clone(),
                    timestamp: now,
                    payload: serde_json::json!({
                        "mac": observed.mac,
                        "existing_lc": collision.last_seen_by,
                        "incoming_lc": report.lc_id,
                    }),
                    hmac: None,
                })?;
                conflicts_recorded += 1;
            }

            let existing = self.nib.get_device(&device_id)?;
            let expected_version = existing.as_ref().map(|d| d.version);
            let device = Device {
                device_id: device_id.clone(),
                region: report.region.clone(),
                mac: observed.mac.clone(),
                ip: observed.ip.clone(),
                hostname: observed.hostname.clone(),
                status: existing
                    .as_ref()
                    .map(|d| d.status)
                    .unwrap_or(DeviceStatus::Quarantined),
                last_seen_by: report.lc_id.clone(),
                last_seen_at: now,
                version: existing.map(|d| d.version).unwrap_or(0),
                attributes: observed.attributes.clone(),
            };

            match self.nib.upsert_device(device, expected_version) {
                Ok(_) => devices_upserted += 1,
                // Another writer raced this device; the next cycle's report
                // re-observes and retries rather than failing the whole ack.
                Err(pdsno_c1_nib::NibError::Conflict { id, .. }) => {
                    warn!(device_id = %id, "discovery upsert lost an optimistic-concurrency race, will retry next cycle");
                }
                Err(e) => return Err(e),
            }
        }

        for conflict in &report.conflicts {
            self.nib.append_event(Event {
                event_id: Uuid::new_v4().to_string(),
                event_type: "MAC_CONFLICT".to_string(),
                actor_id: report.lc_id.clone(),
                timestamp: now,
                payload: serde_json::json!({
                    "mac": conflict.mac,
                    "existing_lc": conflict.existing_lc,
                    "incoming_lc": conflict.incoming_lc,
                }),
                hmac: None,
            })?;
            conflicts_recorded += 1;
        }

        Ok(DiscoveryReportAck {
            region: report.region.clone(),
            lc_id: report.lc_id.clone(),
            devices_upserted,
            conflicts_recorded,
        })
    }
}
