//! `ApprovalCoordinator`: one tier's view of the approval state machine
//! (spec §4.6 "State machine"). Grounded on `qc-08-consensus`'s
//! choreography pattern (state transitions driven by independently
//! evaluated votes, not direct RPCs) and `pdsno-c4-admission::coordinator`'s
//! transaction-then-event persistence shape, generalized from a one-shot
//! admission handshake to a multi-tier, re-entrant state machine.

use std::sync::Arc;

use dashmap::DashMap;
use pdsno_c1_nib::{NibStore, ReleaseOutcome, Write};
use pdsno_crypto::Ed25519KeyPair;
use pdsno_types::{
    ConfigRequest, DeviceExecutionResult, Event, ExecutionToken, Id, RequestState, Sensitivity,
    TokenConstraints,
};
use tracing::warn;
use uuid::Uuid;

use crate::classification::{classify, policy_versions_match};
use crate::degraded::DegradedDevices;
use crate::errors::ApprovalError;
use crate::routing::{route, RoutingOutcome, Tier};
use crate::token;

#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    pub lock_ttl_secs: i64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self { lock_ttl_secs: 10 * 60 }
    }
}

fn state_label(state: RequestState) -> &'static str {
    match state {
        RequestState::Proposed => "proposed",
        RequestState::PendingRegional => "pending_regional",
        RequestState::PendingGlobal => "pending_global",
        RequestState::PendingConflict => "pending_conflict",
        RequestState::Approved => "approved",
        RequestState::Executing => "executing",
        RequestState::Succeeded => "succeeded",
        RequestState::Failed => "failed",
        RequestState::RolledBack => "rolled_back",
        RequestState::Rejected => "rejected",
        RequestState::Degraded => "degraded",
    }
}

fn tier_label(tier: Tier) -> &'static str {
    match tier {
        Tier::Local => "local",
        Tier::Regional => "regional",
        Tier::Global => "global",
    }
}

fn sensitivity_label(sensitivity: Sensitivity) -> &'static str {
    match sensitivity {
        Sensitivity::Low => "low",
        Sensitivity::Medium => "medium",
        Sensitivity::High => "high",
        Sensitivity::Emergency => "emergency",
    }
}

pub struct ApprovalCoordinator {
    nib: Arc<dyn NibStore>,
    keypair: Ed25519KeyPair,
    tier: Tier,
    controller_id: Id,
    policy_version: u32,
    degraded: DegradedDevices,
    config: ApprovalConfig,
    /// Fencing token captured from each device's `acquire_lock` in
    /// [`Self::evaluate`], held until [`Self::complete_execution`] releases
    /// it. Keyed by `(request_id, device_id)` since a device can carry a
    /// lock for at most one unsettled request at a time, but the process
    /// may be evaluating several requests concurrently.
    held_locks: DashMap<(Id, Id), u64>,
}

impl ApprovalCoordinator {
    pub fn new(
        nib: Arc<dyn NibStore>,
        keypair: Ed25519KeyPair,
        tier: Tier,
        controller_id: impl Into<Id>,
        policy_version: u32,
        config: ApprovalConfig,
    ) -> Self {
        Self {
            nib,
            keypair,
            tier,
            controller_id: controller_id.into(),
            policy_version,
            degraded: DegradedDevices::new(),
            config,
            held_locks: DashMap::new(),
        }
    }

    fn append_transition(&self, request: &mut ConfigRequest, to: RequestState, now: i64, reason: Option<String>) {
        let from = request.state;
        request.audit_trail.push(pdsno_types::StateTransition {
            from,
            to,
            at: now,
            actor_id: self.controller_id.clone(),
            reason,
        });
        request.state = to;
    }

    fn persist(
        &self,
        request: ConfigRequest,
        expected_version: Option<u64>,
        event_type: &str,
        now: i64,
    ) -> Result<ConfigRequest, ApprovalError> {
        self.persist_with(request, expected_version, event_type, now, vec![])
    }

    /// As [`Self::persist`], but `leading_writes` are committed in the same
    /// atomic `transaction` call, ahead of the state-transition upsert and
    /// its event — e.g. [`Write::ConsumeExecutionToken`] in
    /// [`Self::complete_execution`], so a crash can never leave a token
    /// consumed without its authorizing transition having landed too.
    fn persist_with(
        &self,
        mut request: ConfigRequest,
        expected_version: Option<u64>,
        event_type: &str,
        now: i64,
        leading_writes: Vec<Write>,
    ) -> Result<ConfigRequest, ApprovalError> {
        let event = Event {
            event_id: Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            actor_id: self.controller_id.clone(),
            timestamp: now,
            payload: serde_json::json!({
                "request_id": request.request_id,
                "state": request.state,
            }),
            hmac: None,
        };
        let upsert_index = leading_writes.len();
        let mut writes = leading_writes;
        writes.push(Write::UpsertConfigRequest {
            request: request.clone(),
            expected_version,
        });
        writes.push(Write::AppendEvent { event });
        let results = self.nib.transaction(writes)?;
        if let Some(pdsno_c1_nib::WriteResult::Upsert(outcome)) = results.get(upsert_index) {
            request.version = outcome.version;
        }
        Ok(request)
    }

    /// Spec §9 DESIGN NOTES' metrics list: "approval latency by tier and
    /// sensitivity." Called once, at each of the state machine's true
    /// terminal states (`succeeded`, `rejected`, `rolled_back`, `degraded`
    /// — not `failed`, which always has a further transition pending).
    /// Latency is measured from the request's earliest recorded transition
    /// rather than its creation, since `propose` itself doesn't append one.
    fn record_terminal(&self, request: &ConfigRequest, now: i64) {
        pdsno_telemetry::metrics::APPROVAL_TERMINAL_STATES
            .with_label_values(&[state_label(request.state)])
            .inc();
        let sensitivity = request.classified_sensitivity.unwrap_or(request.declared_sensitivity);
        let started_at = request.audit_trail.first().map(|t| t.at).unwrap_or(now);
        let elapsed_secs = (now - started_at).max(0) as f64;
        pdsno_telemetry::metrics::APPROVAL_LATENCY_SECS
            .with_label_values(&[tier_label(self.tier), sensitivity_label(sensitivity)])
            .observe(elapsed_secs);
    }

    /// Spec §4.6's implicit entry point: an LC or operator submits a
    /// configuration intent. Always starts `proposed`.
    #[allow(clippy::too_many_arguments)]
    pub fn propose(
        &self,
        request_id: impl Into<Id>,
        config_hash: impl Into<String>,
        payload: serde_json::Value,
        target_devices: Vec<Id>,
        declared_sensitivity: Sensitivity,
        created_by: impl Into<Id>,
        now: i64,
    ) -> Result<ConfigRequest, ApprovalError> {
        let request = ConfigRequest {
            request_id: request_id.into(),
            config_hash: config_hash.into(),
            payload,
            target_devices,
            declared_sensitivity,
            classified_sensitivity: None,
            policy_version: self.policy_version,
            state: RequestState::Proposed,
            created_by: created_by.into(),
            approvers: Vec::new(),
            execution_token: None,
            audit_trail: Vec::new(),
            version: 0,
        };
        self.persist(request, None, "CONFIG_PROPOSED", now)
    }

    /// Spec §4.6: one tier's independent evaluation of a proposed/forwarded
    /// request — policy-version gate, re-classification, conflict
    /// detection via `acquire_lock`, then routing.
    pub fn evaluate(
        &self,
        mut request: ConfigRequest,
        payload_shape: &str,
        device_roles: &[String],
        blast_radius_bps: u32,
        now: i64,
    ) -> Result<ConfigRequest, ApprovalError> {
        if matches!(
            request.state,
            RequestState::Approved
                | RequestState::Executing
                | RequestState::Succeeded
                | RequestState::Failed
                | RequestState::RolledBack
                | RequestState::Rejected
                | RequestState::Degraded
        ) {
            return Err(ApprovalError::WrongState {
                expected: &["proposed", "pending_regional", "pending_global", "pending_conflict"],
                actual: state_label(request.state),
            });
        }

        if let Some(device_id) = self.degraded.any_degraded(&request.target_devices) {
            self.append_transition(
                &mut request,
                RequestState::Rejected,
                now,
                Some(format!("device {device_id} is degraded")),
            );
            self.record_terminal(&request, now);
            let expected_version = Some(request.version);
            return self.persist(request, expected_version, "CONFIG_REJECTED", now);
        }

        if !policy_versions_match(request.policy_version, self.policy_version) {
            self.append_transition(&mut request, RequestState::Rejected, now, Some("policy_drift".to_string()));
            self.record_terminal(&request, now);
            let expected_version = Some(request.version);
            return self.persist(request, expected_version, "CONFIG_REJECTED", now);
        }

        let sensitivity = classify(payload_shape, request.target_devices.len(), device_roles, blast_radius_bps);
        request.classified_sensitivity = Some(sensitivity);

        for device_id in &request.target_devices {
            match self
                .nib
                .acquire_lock(device_id, &request.request_id, now, self.config.lock_ttl_secs)
            {
                Ok(outcome) => {
                    self.held_locks
                        .insert((request.request_id.clone(), device_id.clone()), outcome.lock.fencing_token);
                }
                Err(pdsno_c1_nib::NibError::Locked { .. }) => {
                    // Locks already acquired earlier in this loop stand — the
                    // TTL they carry, not this coordinator, governs their
                    // lifetime — but this run of `evaluate` never reaches
                    // `complete_execution` for them, so forget the fencing
                    // tokens rather than leak the bookkeeping entry.
                    for settled_device in &request.target_devices {
                        self.held_locks.remove(&(request.request_id.clone(), settled_device.clone()));
                    }
                    self.append_transition(
                        &mut request,
                        RequestState::PendingConflict,
                        now,
                        Some(format!("lock held on {device_id}")),
                    );
                    let expected_version = Some(request.version);
                    return self.persist(request, expected_version, "CONFIG_CONFLICT", now);
                }
                Err(e) => return Err(e.into()),
            }
        }

        match route(self.tier, sensitivity) {
            RoutingOutcome::Forward(next_state) => {
                self.append_transition(&mut request, next_state, now, None);
                let expected_version = Some(request.version);
                self.persist(request, expected_version, "CONFIG_ROUTED", now)
            }
            RoutingOutcome::ApproveHere | RoutingOutcome::SelfApprove => {
                self.approve_and_issue_token(request, now)
            }
        }
    }

    fn approve_and_issue_token(&self, mut request: ConfigRequest, now: i64) -> Result<ConfigRequest, ApprovalError> {
        let sensitivity = request.classified_sensitivity.unwrap_or(request.declared_sensitivity);
        let token_id = Uuid::new_v4().to_string();
        let issued = token::issue(
            token_id,
            request.request_id.clone(),
            request.config_hash.clone(),
            request.target_devices.clone(),
            self.controller_id.clone(),
            now,
            sensitivity,
            TokenConstraints::default(),
            &self.keypair,
        );
        self.nib.put_execution_token(issued.clone())?;
        request.execution_token = Some(issued.token_id);

        self.append_transition(&mut request, RequestState::Approved, now, None);
        let expected_version = Some(request.version);
        self.persist(request, expected_version, "CONFIG_APPROVAL", now)
    }

    /// Load and validate the token an `approved` request carries, ahead of
    /// the LC actually applying the change. Split from [`Self::complete_execution`]
    /// so the caller can fail fast on a bad token before touching any
    /// device.
    pub fn verify_token_for_execution(
        &self,
        request: &ConfigRequest,
        issuer_public_key: &[u8],
    ) -> Result<ExecutionToken, ApprovalError> {
        if request.state != RequestState::Approved {
            return Err(ApprovalError::WrongState {
                expected: &["approved"],
                actual: state_label(request.state),
            });
        }
        let token_id = request.execution_token.as_ref().ok_or(ApprovalError::WrongState {
            expected: &["approved-with-token"],
            actual: "approved-without-token",
        })?;
        let token = self
            .nib
            .get_execution_token(token_id)?
            .ok_or_else(|| ApprovalError::TokenNotFound { token_id: token_id.clone() })?;
        token::verify_scope_and_signature(&token, &request.target_devices, issuer_public_key)?;
        Ok(token)
    }

    /// Spec §4.6 "Execution": transitions `approved → executing`, marking
    /// the start of the LC's apply phase. Callers verify the token first
    /// via [`Self::verify_token_for_execution`].
    pub fn begin_execution(&self, mut request: ConfigRequest, now: i64) -> Result<ConfigRequest, ApprovalError> {
        if request.state != RequestState::Approved {
            return Err(ApprovalError::WrongState {
                expected: &["approved"],
                actual: state_label(request.state),
            });
        }
        self.append_transition(&mut request, RequestState::Executing, now, None);
        let expected_version = Some(request.version);
        self.persist(request, expected_version, "CONFIG_EXECUTING", now)
    }

    /// Spec §4.6: "On success the LC marks `consumed_at` in the NIB within
    /// the same transaction as the state transition to `succeeded`." The
    /// token consume and the request's state transition are committed in
    /// one `NibStore::transaction` call via `Write::ConsumeExecutionToken`,
    /// so a crash can never strand a request in `executing` with its
    /// single-use token already burned.
    pub fn complete_execution(
        &self,
        mut request: ConfigRequest,
        token: &ExecutionToken,
        results: Vec<DeviceExecutionResult>,
        now: i64,
    ) -> Result<ConfigRequest, ApprovalError> {
        if request.state != RequestState::Executing {
            return Err(ApprovalError::WrongState {
                expected: &["executing"],
                actual: state_label(request.state),
            });
        }

        for device_id in &request.target_devices {
            let key = (request.request_id.clone(), device_id.clone());
            if let Some((_, fencing_token)) = self.held_locks.remove(&key) {
                match self.nib.release_lock(device_id, fencing_token, now) {
                    Ok(ReleaseOutcome::Released | ReleaseOutcome::NotHeld) => {}
                    Ok(ReleaseOutcome::StaleToken) => {
                        warn!(%device_id, request_id = %request.request_id, "release_lock rejected a stale fencing token");
                    }
                    Err(e) => warn!(%device_id, error = %e, "failed to release device lock after execution"),
                }
            }
        }

        let all_succeeded = results.iter().all(|r| r.succeeded);
        let next = if all_succeeded { RequestState::Succeeded } else { RequestState::Failed };
        let event_type = if all_succeeded { "CONFIG_EXECUTION_SUCCEEDED" } else { "CONFIG_EXECUTION_FAILED" };
        let reason = serde_json::to_string(&results).ok();
        self.append_transition(&mut request, next, now, reason);
        if all_succeeded {
            self.record_terminal(&request, now);
        }
        let expected_version = Some(request.version);
        let leading_writes = if all_succeeded {
            vec![Write::ConsumeExecutionToken { token_id: token.token_id.clone(), now }]
        } else {
            vec![]
        };
        self.persist_with(request, expected_version, event_type, now, leading_writes)
    }

    /// Spec §4.6 "Rollback": applies on a `failed` request. `rolled_back`
    /// on success; `degraded` (and the affected devices gated from further
    /// changes) if the rollback itself fails. The inverse-apply mechanics
    /// are a device-protocol concern out of scope here; the caller supplies
    /// the outcome.
    pub fn rollback(
        &self,
        mut request: ConfigRequest,
        rollback_succeeded: bool,
        now: i64,
    ) -> Result<ConfigRequest, ApprovalError> {
        if request.state != RequestState::Failed {
            return Err(ApprovalError::WrongState {
                expected: &["failed"],
                actual: state_label(request.state),
            });
        }

        if !rollback_succeeded {
            for device_id in &request.target_devices {
                self.degraded.mark(device_id.clone(), request.request_id.clone());
            }
        }

        let next = if rollback_succeeded { RequestState::RolledBack } else { RequestState::Degraded };
        let event_type = if rollback_succeeded { "CONFIG_ROLLED_BACK" } else { "CONFIG_DEGRADED" };
        self.append_transition(&mut request, next, now, None);
        self.record_terminal(&request, now);
        let expected_version = Some(request.version);
        self.persist(request, expected_version, event_type, now)
    }

    pub fn is_degraded(&self, device_id: &str) -> bool {
        self.degraded.is_degraded(device_id)
    }

    /// Spec §8 scenario 6: "operator clears the flag via a NIB write that
    /// emits a `DEGRADED_CLEARED` event."
    pub fn clear_degraded(&self, device_id: &str, operator_id: impl Into<Id>, now: i64) -> Result<(), ApprovalError> {
        if self.degraded.clear(device_id) {
            self.nib.append_event(Event {
                event_id: Uuid::new_v4().to_string(),
                event_type: "DEGRADED_CLEARED".to_string(),
                actor_id: operator_id.into(),
                timestamp: now,
                payload: serde_json::json!({ "device_id": device_id }),
                hmac: None,
            })?;
        }
        Ok(())
    }
}
