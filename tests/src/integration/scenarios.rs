//! End-to-end scenarios spanning the NIB, the authenticator, admission,
//! discovery, and the approval state machine together, rather than one
//! crate's unit tests in isolation.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use pdsno_c1_nib::{DeviceFilter, MemoryNib, NibStore};
use pdsno_c2_messaging::{sign_envelope, Authenticator, VerifyError};
use pdsno_c4_admission::{AdmissionConfig, AdmissionCoordinator, ChallengeResponse, ValidationRequest};
use pdsno_c5_discovery::{build_report, DeltaTracker, DeltaSummary, DiscoveredDevice, RegionalDiscoveryProcessor};
use pdsno_c6_approval::{ApprovalCoordinator, ApprovalConfig, Tier};
use pdsno_crypto::Ed25519KeyPair;
use pdsno_types::entities::{ControllerRole, DeviceExecutionResult, Sensitivity};
use pdsno_types::envelope::Destination;

fn candidate_sign(keypair: &Ed25519KeyPair, nonce_b64: &str) -> String {
    let nonce = STANDARD.decode(nonce_b64).expect("nonce is valid base64");
    STANDARD.encode(keypair.sign(&nonce))
}

/// Scenario 1: a Local controller bootstraps against its Regional parent
/// and comes out the other side with an assigned id and an active record
/// in the parent's NIB.
#[test]
fn happy_path_admission_ends_with_an_active_controller_in_the_nib() {
    let nib: Arc<dyn NibStore> = Arc::new(MemoryNib::new());
    let secret = b"bootstrap-shared-secret-material".to_vec();
    let coordinator = AdmissionCoordinator::new(
        nib.clone(),
        Ed25519KeyPair::generate(),
        "rc_zone-a",
        AdmissionConfig { bootstrap_secret: secret.clone(), ..Default::default() },
    );

    let candidate_keys = Ed25519KeyPair::generate();
    let now = Utc::now();
    let request = ValidationRequest {
        temp_id: "temp_lc9".to_string(),
        role: ControllerRole::Local,
        region: Some("zone-a".to_string()),
        public_key: candidate_keys.public_key_bytes().to_vec(),
        bootstrap_token: pdsno_c4_admission::bootstrap_token::compute(
            "temp_lc9",
            Some("zone-a"),
            ControllerRole::Local,
            &secret,
        ),
        timestamp: now.to_rfc3339(),
    };

    let challenge = coordinator.handle_validation_request(&request, now).expect("request accepted");
    let response = ChallengeResponse {
        challenge_id: challenge.challenge_id,
        nonce: challenge.nonce.clone(),
        signature: candidate_sign(&candidate_keys, &challenge.nonce),
    };
    let result = coordinator.handle_challenge_response(&response, now).expect("response accepted");

    assert!(!result.error);
    let assigned_id = result.assigned_id.expect("an id was assigned");
    let stored = nib.get_controller(&assigned_id).unwrap().expect("controller persisted");
    assert_eq!(stored.status, pdsno_types::entities::ControllerStatus::Active);
    assert_eq!(stored.validated_by, "rc_zone-a");
}

/// Scenario 2: replaying the exact same signed envelope a second time is
/// rejected at the nonce-cache step, not the signature step.
#[test]
fn replayed_envelope_is_rejected_by_nonce_not_resignature() {
    let secret = b"peer-pair-shared-secret-material";
    let envelope = sign_envelope(
        "lc1",
        Destination::Controller("rc1".to_string()),
        "HEARTBEAT",
        serde_json::json!({}),
        secret,
    );

    let mut authenticator = Authenticator::new(secret.to_vec());
    authenticator.verify(&envelope, Some("lc1")).expect("first delivery verifies");

    let replayed = authenticator.verify(&envelope, Some("lc1"));
    assert_eq!(replayed, Err(VerifyError::Replay));
}

/// Scenario 3: two writers racing to upsert the same device with a stale
/// `expected_version` — exactly one wins, the other is told to retry.
#[test]
fn optimistic_concurrency_lets_exactly_one_racing_writer_win() {
    let nib = MemoryNib::new();
    let device_id = "dev_zone-a_aabbccddeeff".to_string();
    let base = pdsno_types::entities::Device {
        device_id: device_id.clone(),
        region: "zone-a".to_string(),
        mac: "aa:bb:cc:dd:ee:ff".to_string(),
        ip: "10.0.0.5".to_string(),
        hostname: None,
        status: pdsno_types::entities::DeviceStatus::Quarantined,
        last_seen_by: "lc1".to_string(),
        last_seen_at: 1000,
        version: 0,
        attributes: Default::default(),
    };
    let created = nib.upsert_device(base.clone(), None).unwrap();
    assert_eq!(created.version, 1);

    let mut first = base.clone();
    first.version = created.version;
    first.last_seen_at = 1001;
    let mut second = first.clone();
    second.last_seen_at = 1002;

    let first_result = nib.upsert_device(first, Some(created.version));
    let second_result = nib.upsert_device(second, Some(created.version));

    assert!(first_result.is_ok());
    assert!(matches!(second_result, Err(pdsno_c1_nib::NibError::Conflict { .. })));
}

/// Scenario 4: a device missing for one cycle is not yet reported inactive
/// (k=2 damping), but a Regional processor that only sees each cycle's
/// report still upserts every present device each time.
#[test]
fn discovery_delta_damps_a_single_missed_cycle_before_the_regional_processor_sees_it() {
    let mut tracker = DeltaTracker::default();
    let present = |mac: &str| DiscoveredDevice {
        mac: mac.to_string(),
        ip: format!("10.0.1.{}", &mac[mac.len() - 2..]),
        hostname: None,
        attributes: Default::default(),
    };

    let cycle1 = tracker.observe_cycle(&[present("aa:bb:cc:00:00:01"), present("aa:bb:cc:00:00:02")]);
    assert_eq!(cycle1.new.len(), 2);

    let cycle2 = tracker.observe_cycle(&[present("aa:bb:cc:00:00:02")]);
    assert!(cycle2.inactive.is_empty(), "first absence must be damped");

    let nib: Arc<dyn NibStore> = Arc::new(MemoryNib::new());
    let processor = RegionalDiscoveryProcessor::new(nib.clone());
    let report = build_report(
        "zone-a".to_string(),
        "lc1".to_string(),
        vec![present("aa:bb:cc:00:00:02")],
        DeltaSummary { inactive: cycle2.inactive, ..cycle2 },
        vec![],
        false,
    );
    let ack = processor.process_report(&report, 2000).unwrap();
    assert_eq!(ack.devices_upserted, 1);

    let devices = nib.query_devices(&DeviceFilter { region: Some("zone-a".to_string()), ..Default::default() }).unwrap();
    assert_eq!(devices.len(), 1, "scenario only reported one device present this cycle");
}

/// Scenario 5: a firmware change proposed at a Local controller escalates
/// through Regional (forward) to Global (final approval), because its
/// payload shape classifies as `High` at every tier that evaluates it.
#[test]
fn high_sensitivity_escalates_from_local_through_regional_to_global() {
    let shared_nib: Arc<dyn NibStore> = Arc::new(MemoryNib::new());
    let now = 5000;

    let lc = ApprovalCoordinator::new(
        shared_nib.clone(),
        Ed25519KeyPair::generate(),
        Tier::Local,
        "lc1",
        7,
        ApprovalConfig::default(),
    );
    let proposed = lc
        .propose(
            "req-firmware-1",
            "hash-abc",
            serde_json::json!({"version": "2.1.0"}),
            vec!["dev1".to_string()],
            Sensitivity::High,
            "lc1",
            now,
        )
        .unwrap();
    let at_lc = lc.evaluate(proposed, "firmware_upgrade", &["edge".to_string()], 50, now).unwrap();
    assert_eq!(at_lc.state, pdsno_types::entities::RequestState::PendingRegional);

    let rc = ApprovalCoordinator::new(
        shared_nib.clone(),
        Ed25519KeyPair::generate(),
        Tier::Regional,
        "rc_zone-a",
        7,
        ApprovalConfig::default(),
    );
    let at_rc = rc.evaluate(at_lc, "firmware_upgrade", &["edge".to_string()], 50, now + 1).unwrap();
    assert_eq!(at_rc.state, pdsno_types::entities::RequestState::PendingGlobal);
    assert!(at_rc.execution_token.is_none());

    let gc = ApprovalCoordinator::new(
        shared_nib,
        Ed25519KeyPair::generate(),
        Tier::Global,
        "gc",
        7,
        ApprovalConfig::default(),
    );
    let at_gc = gc.evaluate(at_rc, "firmware_upgrade", &["edge".to_string()], 50, now + 2).unwrap();
    assert_eq!(at_gc.state, pdsno_types::entities::RequestState::Approved);
    assert!(at_gc.execution_token.is_some());
}

/// Scenario 6: a failed execution whose rollback also fails leaves the
/// device degraded; a fresh proposal targeting that same device is
/// rejected outright, until the operator clears the flag.
#[test]
fn failed_rollback_degrades_a_device_until_the_operator_clears_it() {
    let keypair = Ed25519KeyPair::generate();
    let coordinator = ApprovalCoordinator::new(
        Arc::new(MemoryNib::new()),
        keypair.clone(),
        Tier::Regional,
        "rc_zone-a",
        1,
        ApprovalConfig::default(),
    );

    let proposed = coordinator
        .propose("req1", "hash1", serde_json::json!({}), vec!["dev1".to_string()], Sensitivity::Low, "lc1", 1000)
        .unwrap();
    let approved = coordinator.evaluate(proposed, "acl_update", &["edge".to_string()], 10, 1000).unwrap();
    let token = coordinator.verify_token_for_execution(&approved, &keypair.public_key_bytes()).unwrap();
    let executing = coordinator.begin_execution(approved, 1001).unwrap();
    let results = vec![DeviceExecutionResult { device_id: "dev1".to_string(), succeeded: false, detail: Some("timeout".to_string()) }];
    let failed = coordinator.complete_execution(executing, &token, results, 1002).unwrap();

    let degraded = coordinator.rollback(failed, false, 1003).unwrap();
    assert_eq!(degraded.state, pdsno_types::entities::RequestState::Degraded);
    assert!(coordinator.is_degraded("dev1"));

    let second = coordinator
        .propose("req2", "hash2", serde_json::json!({}), vec!["dev1".to_string()], Sensitivity::Low, "lc1", 1004)
        .unwrap();
    let rejected = coordinator.evaluate(second, "acl_update", &["edge".to_string()], 10, 1004).unwrap();
    assert_eq!(rejected.state, pdsno_types::entities::RequestState::Rejected);

    coordinator.clear_degraded("dev1", "operator1", 1005).unwrap();
    assert!(!coordinator.is_degraded("dev1"));

    let third = coordinator
        .propose("req3", "hash3", serde_json::json!({}), vec!["dev1".to_string()], Sensitivity::Low, "lc1", 1006)
        .unwrap();
    let approved_again = coordinator.evaluate(third, "acl_update", &["edge".to_string()], 10, 1006).unwrap();
    assert_eq!(approved_again.state, pdsno_types::entities::RequestState::Approved);
}
