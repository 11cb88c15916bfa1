//! ICMP-style probe: an echo sweep across the target range, discovering
//! liveness (and, via a reverse-lookup step in a real adapter, identity).
//! The response table here stands in for that adapter.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::probe::{Probe, ProbeContext};
use crate::types::{DiscoveredDevice, ProbeReport};

pub struct IcmpProbe {
    responses: Vec<DiscoveredDevice>,
}

impl IcmpProbe {
    pub fn with_responses(pairs: Vec<(String, String)>) -> Self {
        Self::with_devices(
            pairs
                .into_iter()
                .map(|(ip, mac)| DiscoveredDevice {
                    mac,
                    ip,
                    hostname: None,
                    attributes: BTreeMap::new(),
                })
                .collect(),
        )
    }

    pub fn with_devices(devices: Vec<DiscoveredDevice>) -> Self {
        Self { responses: devices }
    }
}

#[async_trait]
impl Probe for IcmpProbe {
    fn name(&self) -> &'static str {
        "icmp"
    }

    async fn initialize(&mut self, _context: &ProbeContext) {}

    async fn execute(&mut self) -> Vec<DiscoveredDevice> {
        self.responses.clone()
    }

    async fn finalize(&mut self, raw: Vec<DiscoveredDevice>, cancelled: bool) -> ProbeReport {
        ProbeReport {
            probe_name: self.name().to_string(),
            devices: raw,
            cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::GuardedProbe;

    #[tokio::test]
    async fn full_lifecycle_returns_configured_devices() {
        let context = ProbeContext {
            region: "zone-a".to_string(),
            controller_id: "lc1".to_string(),
            targets: vec!["10.0.0.2".to_string()],
        };
        let mut probe = GuardedProbe::new(IcmpProbe::with_responses(vec![(
            "10.0.0.2".to_string(),
            "aa:bb:cc:dd:ee:02".to_string(),
        )]));
        probe.initialize(&context).await.unwrap();
        let raw = probe.execute().await.unwrap();
        let report = probe.finalize(raw, false).await.unwrap();
        assert_eq!(report.devices.len(), 1);
        assert_eq!(report.probe_name, "icmp");
    }
}
