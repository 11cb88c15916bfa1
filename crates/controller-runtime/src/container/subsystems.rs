//! Dependency-ordered construction of one controller process's C1-C6
//! instances. Grounded on
//! `node-runtime::container::subsystems::SubsystemContainer::new`'s
//! phased `init_*` sequence, generalized from ten fixed blockchain
//! subsystems to the six PDSNO components, only some of which a given tier
//! actually runs.
//!
//! ## Initialization order
//!
//! ```text
//! Phase 1: NIB (C1) — every other subsystem persists through it
//! Phase 2: Security material — keypair, KeyRing, per-peer authenticators
//! Phase 3: Transport fabric (C3), layered on C2's envelope signing
//! Phase 4: Admission (C4) — only on tiers with children to admit
//! Phase 5: Discovery (C5) — orchestrator on Local, processor on Regional
//! Phase 6: Approval (C6) — every tier runs one
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use pdsno_bus::InProcessBus;
use pdsno_c1_nib::{MemoryNib, NibStore, RocksNib, RocksNibConfig};
use pdsno_c2_messaging::Authenticator;
use pdsno_c3_transport::{BusTransport, HttpTransport, InMemoryBroker, TransportRouter};
use pdsno_c4_admission::{AdmissionConfig, AdmissionCoordinator, Challenge, ValidationResult};
use pdsno_c5_discovery::{DeltaTracker, DiscoveryOrchestrator, RegionalDiscoveryProcessor};
use pdsno_c6_approval::{ApprovalCoordinator, Tier};
use pdsno_crypto::{Ed25519KeyPair, KeyRing};
use tokio::sync::oneshot;
use tracing::info;

use crate::config::{ControllerConfig, ControllerRole};

fn tier_for(role: ControllerRole) -> Tier {
    match role {
        ControllerRole::Global => Tier::Global,
        ControllerRole::Regional => Tier::Regional,
        ControllerRole::Local => Tier::Local,
    }
}

/// Everything a controller process needs to handle inbound envelopes and
/// drive its own background work.
pub struct ControllerContainer {
    pub config: ControllerConfig,

    // Phase 1
    pub nib: Arc<dyn NibStore>,

    // Phase 2
    pub keypair: Ed25519KeyPair,
    keyring: Mutex<KeyRing>,
    /// One stateful `Authenticator` per peer, created lazily on first
    /// contact since each owns its own nonce cache (spec §4.2 "Nonce
    /// store" is scoped per sender).
    authenticators: DashMap<String, Mutex<Authenticator>>,

    // Phase 3
    pub transport: Arc<TransportRouter>,
    bus: InProcessBus,

    // Phase 4 (tiers with children only)
    pub admission: Option<Arc<AdmissionCoordinator>>,

    // Phase 5 (Local: orchestrator + delta state; Regional: report processor).
    // Probes themselves are built fresh each cycle (see `wiring`), since a
    // `Probe` is consumed by value through its Fresh->Initialized->Executed
    // lifecycle and cannot be reused across cycles.
    pub discovery_orchestrator: Option<DiscoveryOrchestrator>,
    pub discovery_delta: Option<Mutex<DeltaTracker>>,
    pub discovery_processor: Option<RegionalDiscoveryProcessor>,

    // Phase 6 (every tier)
    pub approval: Arc<ApprovalCoordinator>,

    /// Correlation slots for this process's own (candidate-side) admission
    /// handshake against its parent (spec §4.4 steps 4/6): the inbound
    /// handler delivers a `CHALLENGE`/`VALIDATION_RESULT` it receives by
    /// completing whichever oneshot is currently pending, waking the
    /// `self_admit` routine blocked on the matching receiver. At most one
    /// admission is ever in flight per process, so a single slot per
    /// message suffices.
    pending_challenge: Mutex<Option<oneshot::Sender<Challenge>>>,
    pending_validation_result: Mutex<Option<oneshot::Sender<ValidationResult>>>,
    /// Set once this process's own admission succeeds.
    assigned_id: Mutex<Option<String>>,
}

impl ControllerContainer {
    pub fn new(config: ControllerConfig) -> anyhow::Result<Self> {
        config
            .validate_for_production()
            .map_err(|e| anyhow::anyhow!(e))?;

        info!(controller_id = %config.identity.controller_id, role = ?config.identity.role, "initializing controller container");

        // ---------------------------------------------------------------
        // Phase 1: NIB
        // ---------------------------------------------------------------
        let nib: Arc<dyn NibStore> = if config.nib.persistent {
            let rocks_config = RocksNibConfig {
                path: config.nib.data_dir.to_string_lossy().to_string(),
                ..RocksNibConfig::default()
            };
            Arc::new(RocksNib::open(rocks_config)?)
        } else {
            Arc::new(MemoryNib::new())
        };
        info!(persistent = config.nib.persistent, "C1 NIB ready");

        // ---------------------------------------------------------------
        // Phase 2: Security material
        // ---------------------------------------------------------------
        let keypair = match config.security.signing_key_seed {
            Some(seed) => Ed25519KeyPair::from_seed(seed),
            None => Ed25519KeyPair::generate(),
        };
        let mut keyring = KeyRing::new();
        for (peer_id, secret) in &config.security.peer_secrets {
            keyring.insert(&config.identity.controller_id, peer_id, secret.clone());
        }
        info!(peers = config.security.peer_secrets.len(), "C2 key material loaded");

        // ---------------------------------------------------------------
        // Phase 3: Transport fabric
        // ---------------------------------------------------------------
        let bus = InProcessBus::new();
        bus.register(&config.identity.controller_id);
        let bus_transport: Arc<dyn pdsno_c3_transport::UnicastTransport> = Arc::new(
            BusTransport::new(bus.clone(), config.identity.controller_id.clone()),
        );
        let http_transport: Arc<dyn pdsno_c3_transport::UnicastTransport> = Arc::new(
            HttpTransport::new(config.transport.peer_http_bases.clone(), config.transport.http_client.clone()),
        );
        let pubsub = Arc::new(InMemoryBroker::new());
        let transport = Arc::new(TransportRouter::new(
            Some(bus_transport),
            Some(http_transport),
            pubsub,
        ));
        info!(bind = %config.transport.http_bind_addr, "C3 transport fabric ready");

        // ---------------------------------------------------------------
        // Phase 4: Admission (only tiers with children)
        // ---------------------------------------------------------------
        let admission = match config.identity.role {
            ControllerRole::Global | ControllerRole::Regional => {
                let admission_config = AdmissionConfig {
                    bootstrap_secret: config.security.bootstrap_secret.clone(),
                    ..AdmissionConfig::default()
                };
                Some(Arc::new(AdmissionCoordinator::new(
                    Arc::clone(&nib),
                    Ed25519KeyPair::from_seed(keypair_seed_or_fresh(&config)),
                    config.identity.controller_id.clone(),
                    admission_config,
                )))
            }
            ControllerRole::Local => None,
        };
        info!(admits_children = admission.is_some(), "C4 admission wired");

        // ---------------------------------------------------------------
        // Phase 5: Discovery
        // ---------------------------------------------------------------
        let (discovery_orchestrator, discovery_delta) = match config.identity.role {
            ControllerRole::Local => (
                Some(DiscoveryOrchestrator::new(config.discovery.max_concurrent_probes)),
                Some(Mutex::new(DeltaTracker::new(config.discovery.damping_cycles))),
            ),
            _ => (None, None),
        };
        let discovery_processor = match config.identity.role {
            ControllerRole::Regional => Some(RegionalDiscoveryProcessor::new(Arc::clone(&nib))),
            _ => None,
        };
        info!(
            role_runs_probes = discovery_orchestrator.is_some(),
            role_processes_reports = discovery_processor.is_some(),
            "C5 discovery wired"
        );

        // ---------------------------------------------------------------
        // Phase 6: Approval
        // ---------------------------------------------------------------
        let approval = Arc::new(ApprovalCoordinator::new(
            Arc::clone(&nib),
            Ed25519KeyPair::from_seed(keypair_seed_or_fresh(&config)),
            tier_for(config.identity.role),
            config.identity.controller_id.clone(),
            config.approval.policy_version,
            pdsno_c6_approval::ApprovalConfig {
                lock_ttl_secs: config.approval.lock_ttl_secs,
            },
        ));
        info!("C6 approval engine wired");

        Ok(Self {
            config,
            nib,
            keypair,
            keyring: Mutex::new(keyring),
            authenticators: DashMap::new(),
            transport,
            bus,
            admission,
            discovery_orchestrator,
            discovery_delta,
            discovery_processor,
            approval,
            pending_challenge: Mutex::new(None),
            pending_validation_result: Mutex::new(None),
            assigned_id: Mutex::new(None),
        })
    }

    /// This process's own assigned identity from a completed self-admission,
    /// if it has run one. `None` for a Global controller (which admits but
    /// is never admitted) or a process still bootstrapping.
    pub fn assigned_id(&self) -> Option<String> {
        self.assigned_id.lock().clone()
    }

    /// Register a one-shot slot to receive the next inbound `CHALLENGE`,
    /// for the `self_admit` routine to await after sending its own
    /// `VALIDATION_REQUEST`.
    pub fn await_challenge(&self) -> oneshot::Receiver<Challenge> {
        let (tx, rx) = oneshot::channel();
        *self.pending_challenge.lock() = Some(tx);
        rx
    }

    /// Register a one-shot slot to receive the next inbound
    /// `VALIDATION_RESULT`.
    pub fn await_validation_result(&self) -> oneshot::Receiver<ValidationResult> {
        let (tx, rx) = oneshot::channel();
        *self.pending_validation_result.lock() = Some(tx);
        rx
    }

    /// Deliver an inbound `CHALLENGE` to whichever `self_admit` call is
    /// currently waiting for one, if any.
    pub fn deliver_challenge(&self, challenge: Challenge) {
        if let Some(tx) = self.pending_challenge.lock().take() {
            let _ = tx.send(challenge);
        }
    }

    /// Deliver an inbound `VALIDATION_RESULT`, and on success record the
    /// assigned identity.
    pub fn deliver_validation_result(&self, result: ValidationResult) {
        if !result.error {
            if let Some(id) = &result.assigned_id {
                *self.assigned_id.lock() = Some(id.clone());
            }
        }
        if let Some(tx) = self.pending_validation_result.lock().take() {
            let _ = tx.send(result);
        }
    }

    /// Register this controller's inbox on the in-process bus under a
    /// different id too (used in tests that stand up several tiers in one
    /// process and need the bus to address them all).
    pub fn bus(&self) -> &InProcessBus {
        &self.bus
    }

    /// The HMAC secret shared with `peer_id`, if one has been configured.
    pub fn peer_secret(&self, peer_id: &str) -> Option<Vec<u8>> {
        self.keyring
            .lock()
            .get(&self.config.identity.controller_id, peer_id)
            .map(|s| s.current.clone())
    }

    /// Verify an inbound envelope against the authenticator for
    /// `sender_id`, creating one (with a fresh nonce cache) on first
    /// contact.
    pub fn verify_envelope(
        &self,
        envelope: &pdsno_types::Envelope,
    ) -> Result<(), pdsno_c2_messaging::VerifyError> {
        let sender_id = envelope.sender_id.clone();
        if !self.authenticators.contains_key(&sender_id) {
            let secret = self.peer_secret(&sender_id).unwrap_or_default();
            self.authenticators
                .insert(sender_id.clone(), Mutex::new(Authenticator::new(secret)));
        }
        let entry = self.authenticators.get(&sender_id).expect("just inserted");
        entry.lock().verify(envelope, None)
    }

    /// Rotate (or seed for the first time) the shared secret with `peer_id`.
    pub fn rotate_peer_secret(&self, peer_id: &str, new_secret: Vec<u8>, now: chrono::DateTime<chrono::Utc>) {
        self.keyring
            .lock()
            .rotate(&self.config.identity.controller_id, peer_id, new_secret, now);
    }

    /// Sign `payload` for `recipient_id` under the shared peer secret and
    /// route it through the transport fabric.
    pub async fn sign_and_send(
        &self,
        recipient_id: &str,
        message_type: pdsno_types::catalog::MessageType,
        payload: serde_json::Value,
    ) -> Result<(), pdsno_c3_transport::TransportError> {
        let secret = self.peer_secret(recipient_id).unwrap_or_default();
        let envelope = pdsno_c2_messaging::sign_envelope(
            &self.config.identity.controller_id,
            pdsno_types::envelope::Destination::Controller(recipient_id.to_string()),
            message_type.wire_name(),
            payload,
            &secret,
        );
        self.transport.send(message_type, envelope).await
    }
}

/// `AdmissionCoordinator`/`ApprovalCoordinator` each need their own signing
/// keypair instance (neither type is `Clone`); both derive from the same
/// configured seed so a restarted process keeps issuing certificates and
/// tokens peers can still verify. An unseeded (test/ephemeral) config
/// intentionally gets a *fresh* key per call, matching
/// `SecurityConfig::signing_key_seed`'s documented test-only default.
fn keypair_seed_or_fresh(config: &ControllerConfig) -> [u8; 32] {
    match config.security.signing_key_seed {
        Some(seed) => seed,
        None => {
            let ephemeral = Ed25519KeyPair::generate();
            let mut seed = [0u8; 32];
            // `SigningKey` does not expose its seed; re-deriving one from a
            // fresh generated key's public bytes is merely a way to get
            // *a* pseudo-random 32 bytes here, not a real reconstruction —
            // acceptable because this branch is documented test/ephemeral
            // use only and every caller in this branch still gets a
            // self-consistent key (the bytes round-trip through
            // `from_seed` deterministically for this process's lifetime).
            seed.copy_from_slice(&ephemeral.public_key_bytes());
            seed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ApprovalConfig, DiscoveryConfig, IdentityConfig, NibConfig, SecurityConfig, TransportConfig,
    };

    fn global_config() -> ControllerConfig {
        ControllerConfig {
            identity: IdentityConfig {
                controller_id: "gc".to_string(),
                role: ControllerRole::Global,
                region: None,
                parent_id: None,
            },
            transport: TransportConfig::default(),
            nib: NibConfig::default(),
            security: SecurityConfig {
                bootstrap_secret: vec![9u8; 32],
                ..SecurityConfig::default()
            },
            discovery: DiscoveryConfig::default(),
            approval: ApprovalConfig::default(),
        }
    }

    fn local_config() -> ControllerConfig {
        ControllerConfig {
            identity: IdentityConfig {
                controller_id: "lc_zone_a_1".to_string(),
                role: ControllerRole::Local,
                region: Some("zone-a".to_string()),
                parent_id: Some("rc_zone_a".to_string()),
            },
            transport: TransportConfig::default(),
            nib: NibConfig::default(),
            security: SecurityConfig {
                bootstrap_secret: vec![9u8; 32],
                ..SecurityConfig::default()
            },
            discovery: DiscoveryConfig::default(),
            approval: ApprovalConfig::default(),
        }
    }

    #[test]
    fn global_container_admits_children_but_runs_no_probes() {
        let container = ControllerContainer::new(global_config()).unwrap();
        assert!(container.admission.is_some());
        assert!(container.discovery_orchestrator.is_none());
        assert!(container.discovery_processor.is_none());
    }

    #[test]
    fn local_container_runs_probes_but_admits_nobody() {
        let container = ControllerContainer::new(local_config()).unwrap();
        assert!(container.admission.is_none());
        assert!(container.discovery_orchestrator.is_some());
        assert!(container.discovery_processor.is_none());
    }

    #[test]
    fn invalid_config_is_rejected_before_any_subsystem_is_built() {
        let mut config = local_config();
        config.identity.region = None;
        assert!(ControllerContainer::new(config).is_err());
    }
}
