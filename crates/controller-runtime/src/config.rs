//! # Controller Configuration
//!
//! Unified configuration for one controller process: its identity and
//! tier, the NIB backend, the transport fabric, security material, and the
//! discovery/approval tuning knobs. Grounded on
//! `node-runtime::container::config::NodeConfig`'s nested-struct-plus-
//! `validate_for_production` shape, generalized from compile-time
//! subsystem selection to the tier/region identity PDSNO processes need.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use pdsno_crypto::keyring::MIN_SECRET_LEN;
use thiserror::Error;

/// Which control tier this process runs as. Distinct from
/// `pdsno_types::entities::ControllerRole`: that type names a *validated*
/// controller's role as recorded in the NIB; this one is the process's own
/// configured identity before (or absent) any admission handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerRole {
    Global,
    Regional,
    Local,
}

impl From<ControllerRole> for pdsno_types::entities::ControllerRole {
    fn from(role: ControllerRole) -> Self {
        match role {
            ControllerRole::Global => pdsno_types::entities::ControllerRole::Global,
            ControllerRole::Regional => pdsno_types::entities::ControllerRole::Regional,
            ControllerRole::Local => pdsno_types::entities::ControllerRole::Local,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bootstrap secret must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    BootstrapSecretTooShort(usize),
    #[error("regional and local controllers must configure a region")]
    MissingRegion,
    #[error("regional and local controllers must configure a parent_id")]
    MissingParentId,
    #[error("controller_id must not be empty")]
    EmptyControllerId,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub identity: IdentityConfig,
    pub transport: TransportConfig,
    pub nib: NibConfig,
    pub security: SecurityConfig,
    pub discovery: DiscoveryConfig,
    pub approval: ApprovalConfig,
}

impl ControllerConfig {
    /// Spec §1's production readiness gate, generalized from the teacher's
    /// single HMAC-secret check to every piece of configured security
    /// material a tier actually uses.
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.identity.controller_id.is_empty() {
            return Err(ConfigError::EmptyControllerId);
        }
        if self.identity.role != ControllerRole::Global && self.identity.region.is_none() {
            return Err(ConfigError::MissingRegion);
        }
        if self.identity.role != ControllerRole::Global && self.identity.parent_id.is_none() {
            return Err(ConfigError::MissingParentId);
        }
        if self.security.bootstrap_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::BootstrapSecretTooShort(
                self.security.bootstrap_secret.len(),
            ));
        }
        Ok(())
    }
}

/// This process's own identity.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub controller_id: String,
    pub role: ControllerRole,
    /// `None` for Global; required for Regional/Local.
    pub region: Option<String>,
    /// The controller this process admits through and forwards to. `None`
    /// for Global, which has no parent.
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub http_bind_addr: SocketAddr,
    /// Base URL of each known peer's inbound envelope endpoint, keyed by
    /// `controller_id` (spec §5 "HTTP tier").
    pub peer_http_bases: HashMap<String, String>,
    pub http_client: pdsno_c3_transport::HttpClientConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            http_bind_addr: "0.0.0.0:7400".parse().expect("valid default socket addr"),
            peer_http_bases: HashMap::new(),
            http_client: pdsno_c3_transport::HttpClientConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NibConfig {
    pub data_dir: PathBuf,
    /// `false` uses `MemoryNib` (tests, ephemeral Local controllers per
    /// spec §4.1's note that Local tiers may run with no persistent NIB of
    /// their own); `true` opens `RocksNib` at `data_dir`.
    pub persistent: bool,
}

impl Default for NibConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/nib"),
            persistent: false,
        }
    }
}

/// Security material. `hmac_secret` MUST NOT be empty in production;
/// enforced by [`ControllerConfig::validate_for_production`].
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Shared out-of-band with the parent tier (spec §4.4 step 1): proves
    /// the candidate belongs to this deployment before any identity is
    /// assigned.
    pub bootstrap_secret: Vec<u8>,
    /// Per-peer-pair HMAC secrets seeded into this process's `KeyRing` at
    /// startup (`(peer_controller_id, secret)`); production deployments
    /// rotate these out-of-band via `KeyRing::rotate` (spec §4.2 "Key
    /// management"), which this config does not model.
    pub peer_secrets: Vec<(String, Vec<u8>)>,
    /// This controller's ed25519 signing key, used for admission
    /// certificates/delegation credentials and execution tokens. `None`
    /// generates an ephemeral key at startup, which is only appropriate
    /// for tests (spec §4.4, §4.6: production keys must be durable across
    /// restarts so previously issued tokens/certificates keep verifying).
    pub signing_key_seed: Option<[u8; 32]>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            bootstrap_secret: Vec::new(),
            peer_secrets: Vec::new(),
            signing_key_seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Only consulted on Local controllers, which run the probe pool.
    pub max_concurrent_probes: usize,
    pub damping_cycles: u32,
    pub targets: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_probes: 8,
            damping_cycles: pdsno_c5_discovery::DEFAULT_DAMPING_CYCLES,
            targets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    pub lock_ttl_secs: i64,
    pub policy_version: u32,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        let inner = pdsno_c6_approval::ApprovalConfig::default();
        Self {
            lock_ttl_secs: inner.lock_ttl_secs,
            policy_version: 1,
        }
    }
}
