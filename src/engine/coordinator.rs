//! Run coordinator.
//!
//! Drives one discharge run: check runner, substitution of missing or failed
//! sources, aggregation, decision, then persistence. Persistence is best
//! effort and never changes the returned decision.

use crate::data::records::is_valid_patient_id;
use crate::engine::aggregator::{aggregate, SeverityProfile};
use crate::engine::decision::{decide, Decision};
use crate::engine::finding::{Finding, Source, Status};
use crate::engine::runner::{CancelFlag, CheckRunner, SourceReport};
use crate::persist::{DecisionRecord, Persistence};
use crate::DischargeError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// How a source's finding entered the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// The check returned a finding
    Reported,
    /// The check failed and was replaced by an ERROR finding
    Substituted,
    /// The runner returned no report for the source
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub source: Source,
    pub kind: AuditKind,
    pub status: Status,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Per-source record of how each finding was obtained, in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditTrail {
    pub events: Vec<AuditEvent>,
}

impl AuditTrail {
    pub fn substituted(&self) -> impl Iterator<Item = &AuditEvent> {
        self.events.iter().filter(|e| e.kind != AuditKind::Reported)
    }
}

/// Everything produced by one run.
#[derive(Debug, Clone)]
pub struct CoordinatorRun {
    pub patient_id: String,
    /// One per source, canonical order
    pub findings: Vec<Finding>,
    pub profile: SeverityProfile,
    pub decision: Decision,
    pub audit: AuditTrail,
    pub decided_at: DateTime<Utc>,
}

pub struct Coordinator {
    runner: Box<dyn CheckRunner>,
    persistence: Box<dyn Persistence>,
}

impl Coordinator {
    pub fn new(runner: Box<dyn CheckRunner>, persistence: Box<dyn Persistence>) -> Self {
        Coordinator {
            runner,
            persistence,
        }
    }

    /// Run all checks for `patient_id` and return the decision.
    pub fn run(&self, patient_id: &str) -> Result<Decision, DischargeError> {
        self.run_detailed(patient_id, &CancelFlag::new())
            .map(|run| run.decision)
    }

    /// Like [`Coordinator::run`], returning the complete run and honoring
    /// `cancel`.
    ///
    /// # Errors
    ///
    /// - `InvalidPatientId` for a blank id or one that is not a safe file
    ///   name (see [`is_valid_patient_id`])
    /// - `Cancelled` if the flag is set before every check reports
    /// - `ContractViolation` if a check returned a malformed finding
    pub fn run_detailed(
        &self,
        patient_id: &str,
        cancel: &CancelFlag,
    ) -> Result<CoordinatorRun, DischargeError> {
        let patient_id = patient_id.trim();
        if !is_valid_patient_id(patient_id) {
            return Err(DischargeError::InvalidPatientId(patient_id.to_string()));
        }

        info!(patient_id, "starting discharge run");
        let reports = self.runner.run_checks(patient_id, cancel)?;
        if cancel.is_cancelled() {
            return Err(DischargeError::Cancelled {
                patient_id: patient_id.to_string(),
            });
        }

        let (findings, audit) = collect_findings(reports)?;
        let profile = aggregate(&findings)?;
        let decision = decide(&profile, &findings)?;
        let decided_at = Utc::now();

        info!(
            patient_id,
            outcome = %decision.outcome,
            max_severity = %profile.max_severity(),
            remediation = decision.remediation_items.len(),
            "discharge decision"
        );

        let run = CoordinatorRun {
            patient_id: patient_id.to_string(),
            findings,
            profile,
            decision,
            audit,
            decided_at,
        };

        let record = DecisionRecord::from_run(&run);
        match self.persistence.save(&record, &run.audit, patient_id) {
            Ok(paths) => debug!(patient_id, files = paths.len(), "decision persisted"),
            Err(e) => warn!(patient_id, error = %e, "failed to persist decision"),
        }

        Ok(run)
    }
}

/// Reduce runner reports to exactly one finding per source.
fn collect_findings(
    reports: Vec<SourceReport>,
) -> Result<(Vec<Finding>, AuditTrail), DischargeError> {
    let mut by_source: BTreeMap<Source, (Finding, AuditEvent)> = BTreeMap::new();

    for report in reports {
        if by_source.contains_key(&report.source) {
            return Err(DischargeError::contract(format!(
                "runner reported source '{}' more than once",
                report.source
            )));
        }

        let (finding, kind, detail) = match report.result {
            Ok(finding) => {
                if finding.source != report.source {
                    return Err(DischargeError::contract(format!(
                        "{} check returned a finding for '{}'",
                        report.source, finding.source
                    )));
                }
                (finding, AuditKind::Reported, None)
            }
            Err(e) => {
                warn!(source = %report.source, error = %e, "check unavailable, substituting ERROR finding");
                let reason = e.to_string();
                (
                    Finding::unavailable(report.source, &reason).with_duration(report.duration_ms),
                    AuditKind::Substituted,
                    Some(reason),
                )
            }
        };

        let event = AuditEvent {
            source: report.source,
            kind,
            status: finding.status,
            duration_ms: report.duration_ms,
            detail,
        };
        by_source.insert(report.source, (finding, event));
    }

    for source in Source::ALL {
        by_source.entry(source).or_insert_with(|| {
            warn!(source = %source, "no report for source, substituting ERROR finding");
            let finding = Finding::unavailable(source, "check never reported");
            let event = AuditEvent {
                source,
                kind: AuditKind::Missing,
                status: finding.status,
                duration_ms: 0,
                detail: Some("check never reported".to_string()),
            };
            (finding, event)
        });
    }

    let (findings, events) = by_source.into_values().unzip();
    Ok((findings, AuditTrail { events }))
}
