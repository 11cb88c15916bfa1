//! ARP-style probe: resolves MAC addresses for targets already believed to
//! be on-link (an ARP table walk, in a real adapter). The response table
//! here stands in for that adapter.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::probe::{Probe, ProbeContext};
use crate::types::{DiscoveredDevice, ProbeReport};

pub struct ArpProbe {
    responses: Vec<DiscoveredDevice>,
}

impl ArpProbe {
    /// `(ip, mac)` pairs this probe will report when executed.
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
impl Probe for ArpProbe {
    fn name(&self) -> &'static str {
        "arp"
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
