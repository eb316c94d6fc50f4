//! Coordinator tests.
//!
//! Drive the coordinator through the real check orchestrator with scripted
//! checks: substitution of failed and missing sources, cancellation,
//! deadlines and best-effort persistence.

use crate::mocks::{
    auto_issue, granting_checks, granting_checks_except, issue, orchestrator, FailingCheck,
    FailingStore, MislabeledCheck, PanickingCheck, RecordingStore, ScriptedCheck, SlowCheck,
};
use discharge_preflight::engine::coordinator::{AuditKind, Coordinator};
use discharge_preflight::persist::{JsonFileStore, NullStore};
use discharge_preflight::{
    CancelFlag, DischargeError, Finding, Outcome, Severity, Source, Status,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn coordinator(checks: Vec<Arc<dyn discharge_preflight::Check>>, parallel: bool) -> Coordinator {
    Coordinator::new(
        Box::new(orchestrator(checks, parallel, 5_000)),
        Box::new(NullStore),
    )
}

#[test]
fn test_all_granted_parallel() {
    let decision = coordinator(granting_checks(), true).run("P00231").unwrap();
    assert_eq!(decision.outcome, Outcome::Approve);
}

#[test]
fn test_all_granted_sequential() {
    let decision = coordinator(granting_checks(), false).run("P00231").unwrap();
    assert_eq!(decision.outcome, Outcome::Approve);
}

#[test]
fn test_parallel_and_sequential_agree() {
    let checks = || {
        granting_checks_except(ScriptedCheck::new(Finding::blocked(
            Source::Bed,
            vec![auto_issue("BED_CLEANUP_DELAY", Severity::Medium)],
        )))
    };
    let parallel = coordinator(checks(), true).run("P1").unwrap();
    let sequential = coordinator(checks(), false).run("P1").unwrap();

    assert_eq!(parallel.outcome, Outcome::PendingAutoResolution);
    assert_eq!(parallel, sequential);
}

#[test]
fn test_failing_check_substituted_with_error() {
    let coordinator = coordinator(
        granting_checks_except(Arc::new(FailingCheck {
            source: Source::Pharmacy,
        })),
        true,
    );
    let run = coordinator.run_detailed("P1", &CancelFlag::new()).unwrap();

    assert_eq!(run.decision.outcome, Outcome::Hold);
    let pharmacy = run
        .findings
        .iter()
        .find(|f| f.source == Source::Pharmacy)
        .unwrap();
    assert_eq!(pharmacy.status, Status::Error);
    assert!(!pharmacy.auto_resolvable);

    let substituted: Vec<_> = run.audit.substituted().collect();
    assert_eq!(substituted.len(), 1);
    assert_eq!(substituted[0].source, Source::Pharmacy);
    assert_eq!(substituted[0].kind, AuditKind::Substituted);
    assert!(substituted[0]
        .detail
        .as_deref()
        .unwrap()
        .contains("connection refused"));
}

#[test]
fn test_panicking_check_does_not_abort_run() {
    for parallel in [true, false] {
        let run = coordinator(
            granting_checks_except(Arc::new(PanickingCheck { source: Source::Lab })),
            parallel,
        )
        .run_detailed("P1", &CancelFlag::new())
        .unwrap();

        assert_eq!(run.decision.outcome, Outcome::Hold);
        assert_eq!(run.findings.len(), 5);
        assert_eq!(run.findings[4].source, Source::Lab);
        assert_eq!(run.findings[4].status, Status::Error);
    }
}

#[test]
fn test_unregistered_source_is_missing() {
    let checks = granting_checks()
        .into_iter()
        .filter(|c| c.source() != Source::Ambulance)
        .collect();
    let run = coordinator(checks, true)
        .run_detailed("P1", &CancelFlag::new())
        .unwrap();

    assert_eq!(run.decision.outcome, Outcome::Hold);
    let event = run
        .audit
        .events
        .iter()
        .find(|e| e.source == Source::Ambulance)
        .unwrap();
    assert_eq!(event.kind, AuditKind::Missing);
    assert_eq!(run.audit.events.len(), 5);
}

#[test]
fn test_parallel_deadline_substitutes_timeout() {
    let slow = Arc::new(SlowCheck {
        source: Source::Insurance,
        delay: Duration::from_secs(2),
    });
    let coordinator = Coordinator::new(
        Box::new(orchestrator(granting_checks_except(slow), true, 100)),
        Box::new(NullStore),
    );

    let start = Instant::now();
    let run = coordinator.run_detailed("P1", &CancelFlag::new()).unwrap();
    assert!(start.elapsed() < Duration::from_millis(1_500));

    assert_eq!(run.decision.outcome, Outcome::Hold);
    let insurance = &run.findings[0];
    assert_eq!(insurance.source, Source::Insurance);
    assert_eq!(insurance.status, Status::Error);
    assert!(insurance.issues[0].description.contains("timed out"));
}

#[test]
fn test_cancelled_run_returns_no_decision() {
    let cancel = CancelFlag::new();
    cancel.cancel();

    let store = RecordingStore::new();
    let coordinator = Coordinator::new(
        Box::new(orchestrator(granting_checks(), false, 5_000)),
        Box::new(store.clone()),
    );
    let err = coordinator.run_detailed("P1", &cancel).unwrap_err();

    assert!(matches!(err, DischargeError::Cancelled { .. }));
    assert!(store.saved().is_empty());
}

#[test]
fn test_blank_patient_id_rejected() {
    let err = coordinator(granting_checks(), true).run("   ").unwrap_err();
    assert!(matches!(err, DischargeError::InvalidPatientId(_)));
}

#[test]
fn test_mislabeled_finding_is_contract_violation() {
    let coordinator = coordinator(
        granting_checks_except(Arc::new(MislabeledCheck {
            registered_as: Source::Bed,
            reports_as: Source::Lab,
        })),
        false,
    );
    let err = coordinator.run("P1").unwrap_err();
    assert!(err.is_contract_violation());
}

#[test]
fn test_persistence_receives_decision_and_audit() {
    let store = RecordingStore::new();
    let coordinator = Coordinator::new(
        Box::new(orchestrator(
            granting_checks_except(ScriptedCheck::new(Finding::blocked(
                Source::Insurance,
                vec![issue("INS_PREAUTH_MISSING", Severity::High)],
            ))),
            true,
            5_000,
        )),
        Box::new(store.clone()),
    );
    coordinator.run(" P77 ").unwrap();

    let saved = store.saved();
    assert_eq!(saved.len(), 1);
    let (record, audit) = &saved[0];
    assert_eq!(record.patient_id, "P77");
    assert_eq!(record.outcome, Outcome::Hold);
    assert_eq!(record.blocked_by, vec![Source::Insurance]);
    assert_eq!(audit.events.len(), 5);
    assert!(audit.events.iter().all(|e| e.kind == AuditKind::Reported));
}

#[test]
fn test_persistence_failure_keeps_decision() {
    let coordinator = Coordinator::new(
        Box::new(orchestrator(granting_checks(), true, 5_000)),
        Box::new(FailingStore),
    );
    let decision = coordinator.run("P1").unwrap();
    assert_eq!(decision.outcome, Outcome::Approve);
}

#[test]
fn test_path_like_patient_id_rejected_before_dispatch() {
    let store = RecordingStore::new();
    let coordinator = Coordinator::new(
        Box::new(orchestrator(granting_checks(), true, 5_000)),
        Box::new(store.clone()),
    );

    for id in ["../../../escaped", "P1/../P2", "P 1", "P1.json"] {
        let err = coordinator.run(id).unwrap_err();
        assert!(
            matches!(err, DischargeError::InvalidPatientId(ref rejected) if rejected == id),
            "{} was not rejected: {:?}",
            id,
            err
        );
    }
    assert!(store.saved().is_empty());
}

#[test]
fn test_approval_expiry_overflow_keeps_decision() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(
        dir.path().join("output"),
        dir.path().join("escalations"),
        u32::MAX,
    );
    let coordinator = Coordinator::new(
        Box::new(orchestrator(granting_checks(), true, 5_000)),
        Box::new(store.clone()),
    );

    let decision = coordinator.run("P1").unwrap();
    assert_eq!(decision.outcome, Outcome::Approve);
    assert!(!store.state_path("P1").exists());
    assert!(store.audit_log_path("P1").exists());
}
