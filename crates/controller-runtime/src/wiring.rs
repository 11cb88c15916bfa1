//! # Background Wiring
//!
//! Per-tier background loops that run alongside the inbound HTTP server.
//! Grounded on `node-runtime::wiring::core_subsystems`'s pattern of
//! spawning one `tokio::task` per subsystem that needs a heartbeat, driven
//! off a shared `watch<bool>` shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use pdsno_c4_admission::{bootstrap_token, ValidationRequest, ValidationResult};
use pdsno_c5_discovery::probes::arp::ArpProbe;
use pdsno_c5_discovery::probes::icmp::IcmpProbe;
use pdsno_c5_discovery::{build_report, Probe, ProbeContext};
use pdsno_types::catalog::MessageType;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::ControllerRole;
use crate::container::ControllerContainer;

/// Run this process's own candidate side of the admission protocol (spec
/// §4.4 steps 1, 5) against its configured parent: send `VALIDATION_REQUEST`,
/// await the parent's `CHALLENGE` over the inbound handler, sign its nonce,
/// send `CHALLENGE_RESPONSE`, then await `VALIDATION_RESULT`. Only
/// Regional/Local processes call this; Global has no parent to admit
/// through. Returns the parent's final result (error or not) unless the
/// parent never replies at all, in which case the corresponding `timeout`
/// elapses and this returns `None`.
pub async fn self_admit(container: Arc<ControllerContainer>, temp_id: String, timeout: Duration) -> Option<ValidationResult> {
    let role = container.config.identity.role;
    if role == ControllerRole::Global {
        warn!("self_admit called on a Global controller, which has no parent");
        return None;
    }
    let Some(parent_id) = container.config.identity.parent_id.clone() else {
        warn!("self_admit called with no parent_id configured");
        return None;
    };
    let region = container.config.identity.region.clone();

    let challenge_rx = container.await_challenge();
    let request = ValidationRequest {
        temp_id: temp_id.clone(),
        role: role.into(),
        region: region.clone(),
        public_key: container.keypair.public_key_bytes().to_vec(),
        bootstrap_token: bootstrap_token::compute(
            &temp_id,
            region.as_deref(),
            role.into(),
            &container.config.security.bootstrap_secret,
        ),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    info!(%temp_id, %parent_id, "sending VALIDATION_REQUEST");
    if let Err(e) = container
        .sign_and_send(
            &parent_id,
            MessageType::ValidationRequest,
            serde_json::to_value(&request).expect("ValidationRequest always serializes"),
        )
        .await
    {
        error!(%parent_id, error = %e, "failed to send VALIDATION_REQUEST");
        return None;
    }

    let challenge = match tokio::time::timeout(timeout, challenge_rx).await {
        Ok(Ok(challenge)) => challenge,
        Ok(Err(_)) => {
            error!("challenge channel dropped before a CHALLENGE arrived");
            return None;
        }
        Err(_) => {
            error!(%parent_id, "timed out waiting for CHALLENGE");
            return None;
        }
    };

    let nonce_bytes = match STANDARD.decode(&challenge.nonce) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "CHALLENGE carried a non-base64 nonce");
            return None;
        }
    };
    let signature = container.keypair.sign(&nonce_bytes);
    let response = pdsno_c4_admission::ChallengeResponse {
        challenge_id: challenge.challenge_id,
        nonce: challenge.nonce,
        signature: STANDARD.encode(signature),
    };

    let result_rx = container.await_validation_result();
    info!(%parent_id, "sending CHALLENGE_RESPONSE");
    if let Err(e) = container
        .sign_and_send(
            &parent_id,
            MessageType::ChallengeResponse,
            serde_json::to_value(&response).expect("ChallengeResponse always serializes"),
        )
        .await
    {
        error!(%parent_id, error = %e, "failed to send CHALLENGE_RESPONSE");
        return None;
    }

    match tokio::time::timeout(timeout, result_rx).await {
        Ok(Ok(result)) => Some(result),
        Ok(Err(_)) => {
            error!("validation-result channel dropped before a VALIDATION_RESULT arrived");
            None
        }
        Err(_) => {
            error!(%parent_id, "timed out waiting for VALIDATION_RESULT");
            None
        }
    }
}

/// How often a Local controller runs its probe pool (spec §4.5's cycle
/// cadence is deployment-specific; this is a reasonable poll interval for
/// a process that otherwise only reacts to inbound envelopes).
const DISCOVERY_CYCLE_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn every background loop this tier needs. Returns immediately; the
/// loops run until `shutdown` reports `true`.
pub fn spawn_background_loops(
    container: Arc<ControllerContainer>,
    shutdown: watch::Receiver<bool>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();
    if container.config.identity.role == ControllerRole::Local {
        handles.push(tokio::spawn(discovery_cycle_loop(container, shutdown)));
    }
    handles
}

/// Default probe set: the crate's only concrete `Probe` implementations.
/// Both are illustrative response-table-driven stand-ins (see
/// `pdsno-c5-discovery::probes`), not real ARP/ICMP sockets; a production
/// deployment supplies real probes through the same `Vec<Box<dyn Probe>>`
/// shape.
fn default_probes() -> Vec<Box<dyn Probe>> {
    vec![
        Box::new(ArpProbe::with_responses(Vec::new())),
        Box::new(IcmpProbe::with_responses(Vec::new())),
    ]
}

async fn discovery_cycle_loop(container: Arc<ControllerContainer>, mut shutdown: watch::Receiver<bool>) {
    let Some(orchestrator) = &container.discovery_orchestrator else {
        return;
    };
    let Some(delta) = &container.discovery_delta else {
        return;
    };
    let region = container
        .config
        .identity
        .region
        .clone()
        .unwrap_or_default();
    let lc_id = container.config.identity.controller_id.clone();
    let targets = container.config.discovery.targets.clone();

    info!(%lc_id, %region, "starting discovery cycle loop");
    let mut ticker = tokio::time::interval(DISCOVERY_CYCLE_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!(%lc_id, "discovery cycle loop shutting down");
                    return;
                }
            }
        }

        let context = ProbeContext {
            region: region.clone(),
            controller_id: lc_id.clone(),
            targets: targets.clone(),
        };
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (devices, merge_conflicts, cancelled) =
            orchestrator.run_cycle(default_probes(), context, cancel_rx).await;
        drop(cancel_tx);

        let delta_summary = delta.lock().observe_cycle(&devices);
        let report = build_report(region.clone(), lc_id.clone(), devices, delta_summary, merge_conflicts, cancelled);

        let Some(parent_id) = &container.config.identity.parent_id else {
            warn!(%lc_id, "no parent configured, discarding discovery report");
            continue;
        };
        if let Err(e) = container
            .sign_and_send(
                parent_id,
                MessageType::DiscoveryReport,
                serde_json::to_value(&report).expect("DiscoveryReport always serializes"),
            )
            .await
        {
            error!(%lc_id, error = %e, "failed to send discovery report");
        }
    }
}
