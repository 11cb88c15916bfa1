//! Three-phase probe lifecycle (spec §4.5 "Algorithm lifecycle"):
//! `initialize(context) → execute() → finalize() → report`, order enforced
//! by [`crate::orchestrator::run_probe`] rather than left to each probe.
//! Grounded on the teacher's worker-pool-over-a-domain-trait split
//! (`qc-01-peer-discovery::domain::feeler::FeelerState` is the sync domain
//! logic; the runtime adapter drives it from async tasks) — here the trait
//! itself is async since a probe's `execute` is expected to suspend on I/O.

use async_trait::async_trait;

use crate::errors::DiscoveryError;
use crate::types::{DiscoveredDevice, ProbeReport};

/// Context handed to a probe before its cycle starts: the addresses to
/// scan and the controller id attributing any discovered device.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    pub region: String,
    pub controller_id: String,
    pub targets: Vec<String>,
}

#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &'static str;

    /// Prepare internal state for one discovery cycle.
    async fn initialize(&mut self, context: &ProbeContext);

    /// Scan and return raw per-target results. May suspend; must observe
    /// the orchestrator's cancellation signal at the next safe point.
    async fn execute(&mut self) -> Vec<DiscoveredDevice>;

    /// Fold raw results into a report. `cancelled` is set when the cycle
    /// was cut short, per spec §5 "finalize returns partial results marked
    /// cancelled=true".
    async fn finalize(&mut self, raw: Vec<DiscoveredDevice>, cancelled: bool) -> ProbeReport;
}

#[async_trait]
impl Probe for Box<dyn Probe> {
    fn name(&self) -> &'static str {
        (**self).name()
    }
    async fn initialize(&mut self, context: &ProbeContext) {
        (**self).initialize(context).await
    }
    async fn execute(&mut self) -> Vec<DiscoveredDevice> {
        (**self).execute().await
    }
    async fn finalize(&mut self, raw: Vec<DiscoveredDevice>, cancelled: bool) -> ProbeReport {
        (**self).finalize(raw, cancelled).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fresh,
    Initialized,
    Executed,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Initialized => "initialized",
            Self::Executed => "executed",
        }
    }
}

/// Enforces initialize→execute→finalize ordering at runtime (spec §4.5:
/// "Calling out of order is a programming error and aborts the cycle").
/// The orchestrator is the only caller; this exists so that invariant is a
/// checked fact rather than an assumption about call order.
pub struct GuardedProbe<P: Probe> {
    probe: P,
    phase: Phase,
}

impl<P: Probe> GuardedProbe<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            phase: Phase::Fresh,
        }
    }

    pub fn name(&self) -> &'static str {
        self.probe.name()
    }

    pub async fn initialize(&mut self, context: &ProbeContext) -> Result<(), DiscoveryError> {
        if self.phase != Phase::Fresh {
            return Err(DiscoveryError::OutOfOrder {
                expected: "fresh",
                actual: self.phase.label(),
            });
        }
        self.probe.initialize(context).await;
        self.phase = Phase::Initialized;
        Ok(())
    }

    pub async fn execute(&mut self) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        if self.phase != Phase::Initialized {
            return Err(DiscoveryError::OutOfOrder {
                expected: "initialized",
                actual: self.phase.label(),
            });
        }
        let raw = self.probe.execute().await;
        self.phase = Phase::Executed;
        Ok(raw)
    }

    pub async fn finalize(
        &mut self,
        raw: Vec<DiscoveredDevice>,
        cancelled: bool,
    ) -> Result<ProbeReport, DiscoveryError> {
        if self.phase != Phase::Executed {
            return Err(DiscoveryError::OutOfOrder {
                expected: "executed",
                actual: self.phase.label(),
            });
        }
        Ok(self.probe.finalize(raw, cancelled).await)
    }
}
