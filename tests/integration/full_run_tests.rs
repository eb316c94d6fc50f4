//! Full run integration tests.
//!
//! Patient records are written to a temporary data directory and run
//! through `run_discharge` with the rule-based checks and the JSON file
//! store, then the decision and every persisted file are inspected.

use crate::mocks::{clean_record, hold_record, pending_record, RecordFixture};
use discharge_preflight::data::records::{TransportProvider, TransportRecord, Vehicle};
use discharge_preflight::engine::coordinator::AuditKind;
use discharge_preflight::persist::JsonFileStore;
use discharge_preflight::{run_discharge, CancelFlag, DischargeConfig, Outcome, Source, Status};
use serde_json::Value;
use std::path::Path;

fn read_json(path: &Path) -> Value {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e));
    serde_json::from_str(&text).unwrap()
}

fn store(fixture: &RecordFixture) -> JsonFileStore {
    JsonFileStore::new(fixture.output_dir(), fixture.escalations_dir(), 6)
}

#[test]
fn test_clean_record_approves_and_persists_state() {
    let fixture = RecordFixture::new();
    fixture.write(&clean_record("P00231"));

    let run = run_discharge(&fixture.config(), "P00231", &CancelFlag::new()).unwrap();
    assert_eq!(run.decision.outcome, Outcome::Approve);
    assert!(run.findings.iter().all(|f| f.status == Status::Granted));

    let state = read_json(&store(&fixture).state_path("P00231"));
    assert_eq!(state["patient_id"], "P00231");
    assert_eq!(state["outcome"], "APPROVE");
    assert_eq!(state["approved"], true);
    assert!(state["expires_at"].is_string());

    // Nothing to escalate
    assert!(!fixture.escalations_dir().join("patient_P00231").exists());
}

#[test]
fn test_pending_record_escalates_to_billing() {
    let fixture = RecordFixture::new();
    fixture.write(&pending_record("P2"));

    let run = run_discharge(&fixture.config(), "P2", &CancelFlag::new()).unwrap();
    assert_eq!(run.decision.outcome, Outcome::PendingAutoResolution);
    assert_eq!(run.decision.remediation_items.len(), 1);
    assert_eq!(run.decision.remediation_items[0].code, "BED_CLEANUP_DELAY");

    let state = read_json(&store(&fixture).state_path("P2"));
    assert_eq!(state["outcome"], "PENDING_AUTO_RESOLUTION");
    assert!(state["expires_at"].is_null());

    let patient_dir = fixture.escalations_dir().join("patient_P2");
    let billing = read_json(&patient_dir.join("billing_portal.json"));
    assert_eq!(billing["total_alerts"], 1);
    assert_eq!(billing["alerts"][0]["issue_code"], "BED_CLEANUP_DELAY");
    assert!(patient_dir.join("escalation_summary_P2.json").exists());
}

#[test]
fn test_expired_policy_holds() {
    let fixture = RecordFixture::new();
    fixture.write(&hold_record("P3"));

    let run = run_discharge(&fixture.config(), "P3", &CancelFlag::new()).unwrap();
    assert_eq!(run.decision.outcome, Outcome::Hold);
    assert_eq!(run.decision.remediation_items[0].code, "INS_POLICY_EXPIRED");
    assert_eq!(
        run.profile.blocked_sources().iter().copied().collect::<Vec<_>>(),
        vec![Source::Insurance]
    );

    let summary = read_json(
        &fixture
            .escalations_dir()
            .join("patient_P3")
            .join("escalation_summary_P3.json"),
    );
    assert_eq!(summary["final_decision"], "HOLD");
    assert_eq!(summary["alerts_by_priority"]["urgent"], 1);
}

#[test]
fn test_oncology_patient_needs_transport() {
    let fixture = RecordFixture::new();
    let mut record = clean_record("P4");
    record.patient.diagnosis = "Stage II lung cancer".to_string();
    record.transport = Some(TransportRecord {
        providers: vec![
            TransportProvider {
                name: "City Ambulance".to_string(),
                vehicles: vec![Vehicle {
                    vehicle_type: "ALS".to_string(),
                    available: true,
                    eta_minutes: 45,
                    cost: 220.0,
                }],
            },
            TransportProvider {
                name: "Metro Medical".to_string(),
                vehicles: vec![Vehicle {
                    vehicle_type: "BLS".to_string(),
                    available: true,
                    eta_minutes: 20,
                    cost: 150.0,
                }],
            },
        ],
    });
    fixture.write(&record);

    let run = run_discharge(&fixture.config(), "P4", &CancelFlag::new()).unwrap();
    assert_eq!(run.decision.outcome, Outcome::PendingAutoResolution);
    let item = &run.decision.remediation_items[0];
    assert_eq!(item.code, "TRANSPORT_REQUIRED");
    assert!(item.suggested_action.contains("Metro Medical"));
}

#[test]
fn test_unknown_patient_holds_with_substitutions() {
    let fixture = RecordFixture::new();
    std::fs::create_dir_all(fixture.data_dir()).unwrap();

    let run = run_discharge(&fixture.config(), "P404", &CancelFlag::new()).unwrap();
    assert_eq!(run.decision.outcome, Outcome::Hold);
    assert!(run.findings.iter().all(|f| f.status == Status::Error));
    assert_eq!(run.audit.substituted().count(), 5);
    assert!(run
        .audit
        .events
        .iter()
        .all(|e| e.kind == AuditKind::Substituted));
}

#[test]
fn test_malformed_record_holds() {
    let fixture = RecordFixture::new();
    fixture.write_raw("P5", "{ \"patient_id\": \"P5\", \"insurance\": [");

    let run = run_discharge(&fixture.config(), "P5", &CancelFlag::new()).unwrap();
    assert_eq!(run.decision.outcome, Outcome::Hold);
    assert_eq!(run.profile.max_severity(), discharge_preflight::Severity::Critical);
}

#[test]
fn test_audit_log_appends_per_run() {
    let fixture = RecordFixture::new();
    fixture.write(&clean_record("P6"));
    let config = fixture.config();

    run_discharge(&config, "P6", &CancelFlag::new()).unwrap();
    fixture.write(&hold_record("P6"));
    run_discharge(&config, "P6", &CancelFlag::new()).unwrap();

    let log = read_json(&store(&fixture).audit_log_path("P6"));
    let entries = log.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["final_decision"], "APPROVE");
    assert_eq!(entries[1]["final_decision"], "HOLD");
    assert_eq!(entries[1]["checks"].as_array().unwrap().len(), 5);
    assert_eq!(entries[1]["critical_issues"][0]["code"], "INS_POLICY_EXPIRED");
}

#[test]
fn test_corrupt_audit_log_left_untouched() {
    let fixture = RecordFixture::new();
    fixture.write(&hold_record("P7"));
    let audit_path = store(&fixture).audit_log_path("P7");
    std::fs::create_dir_all(fixture.output_dir()).unwrap();
    std::fs::write(&audit_path, "not json").unwrap();

    // Persistence failure is logged; the decision still comes back
    let run = run_discharge(&fixture.config(), "P7", &CancelFlag::new()).unwrap();
    assert_eq!(run.decision.outcome, Outcome::Hold);
    assert_eq!(std::fs::read_to_string(&audit_path).unwrap(), "not json");

    // State and escalations are written regardless of the audit log
    let state = read_json(&store(&fixture).state_path("P7"));
    assert_eq!(state["outcome"], "HOLD");
    let patient_dir = fixture.escalations_dir().join("patient_P7");
    assert!(patient_dir.join("insurance_desk.json").exists());
    assert!(patient_dir.join("patient_notifications.json").exists());
    assert!(patient_dir.join("escalation_summary_P7.json").exists());
}

#[test]
fn test_traversal_patient_id_writes_nothing() {
    let fixture = RecordFixture::new();
    let nested = fixture.root.path().join("a").join("b");
    let config = DischargeConfig {
        output_dir: nested.join("output"),
        escalations_dir: nested.join("escalations"),
        ..fixture.config()
    };

    let err = run_discharge(&config, "../../../escaped", &CancelFlag::new()).unwrap_err();
    assert!(matches!(err, discharge_preflight::DischargeError::InvalidPatientId(_)));
    assert!(!nested.exists());
    assert!(!fixture.root.path().join("escaped.json").exists());
    assert!(!fixture.root.path().join("escaped").exists());
}

#[test]
fn test_no_persist_writes_nothing() {
    let fixture = RecordFixture::new();
    fixture.write(&hold_record("P8"));
    let config = DischargeConfig {
        persist: false,
        ..fixture.config()
    };

    let run = run_discharge(&config, "P8", &CancelFlag::new()).unwrap();
    assert_eq!(run.decision.outcome, Outcome::Hold);
    assert!(!fixture.output_dir().exists());
    assert!(!fixture.escalations_dir().exists());
}

#[test]
fn test_sequential_matches_parallel() {
    let fixture = RecordFixture::new();
    fixture.write(&hold_record("P9"));
    let parallel = fixture.config();
    let sequential = DischargeConfig {
        parallel: false,
        ..fixture.config()
    };

    let a = run_discharge(&parallel, "P9", &CancelFlag::new()).unwrap();
    let b = run_discharge(&sequential, "P9", &CancelFlag::new()).unwrap();
    assert_eq!(a.decision, b.decision);
    assert_eq!(a.profile, b.profile);
}

#[test]
fn test_invalid_config_rejected() {
    let fixture = RecordFixture::new();
    let config = DischargeConfig {
        timeout_ms: 0,
        ..fixture.config()
    };
    let err = run_discharge(&config, "P1", &CancelFlag::new()).unwrap_err();
    assert!(matches!(err, discharge_preflight::DischargeError::Config(_)));
}
