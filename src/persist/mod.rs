//! Decision persistence.
//!
//! The coordinator hands every completed run to a [`Persistence`]
//! implementation. Failures here are reported back to the coordinator,
//! which logs them; they never change a decision.

pub mod escalation;
pub mod summary;

use crate::data::records::is_valid_patient_id;
use crate::engine::aggregator::SeverityCounts;
use crate::engine::coordinator::{AuditTrail, CoordinatorRun};
use crate::engine::decision::{Outcome, RemediationItem};
use crate::engine::finding::{Issue, Severity, Source, Status};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use summary::DischargeSummary;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("patient id '{0}' cannot be used as a file name")]
    UnsafePatientId(String),

    #[error("approval expiry of {hours}h overflows the decision timestamp")]
    ExpiryOverflow { hours: u32 },

    /// More than one of the state, audit and escalation writes failed.
    #[error("{} persistence writes failed: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<PersistenceError>),
}

fn join_errors(errors: &[PersistenceError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Per-source view of a run as stored in the decision record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source: Source,
    pub status: Status,
    /// Effective severity
    pub severity: Severity,
    pub duration_ms: u64,
    /// Issues carry their effective severity
    pub issues: Vec<Issue>,
}

/// Persisted shape of one decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub patient_id: String,
    pub outcome: Outcome,
    pub approved: bool,
    pub approved_by: Vec<Source>,
    pub blocked_by: Vec<Source>,
    pub reasons: Vec<String>,
    pub remediation_items: Vec<RemediationItem>,
    pub sources: Vec<SourceSummary>,
    pub severity_counts: SeverityCounts,
    pub max_severity: Severity,
    pub summary: DischargeSummary,
    pub decided_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn from_run(run: &CoordinatorRun) -> Self {
        let sources = run
            .findings
            .iter()
            .map(|f| SourceSummary {
                source: f.source,
                status: f.status,
                severity: f.effective_severity(),
                duration_ms: f.duration_ms,
                issues: f
                    .issues
                    .iter()
                    .map(|i| Issue {
                        severity: f.issue_severity(i),
                        ..i.clone()
                    })
                    .collect(),
            })
            .collect();

        DecisionRecord {
            patient_id: run.patient_id.clone(),
            outcome: run.decision.outcome,
            approved: run.decision.outcome.is_approved(),
            approved_by: run.profile.granted_sources().iter().copied().collect(),
            blocked_by: run.profile.blocked_sources().iter().copied().collect(),
            reasons: run.decision.reasons.clone(),
            remediation_items: run.decision.remediation_items.clone(),
            sources,
            severity_counts: *run.profile.counts(),
            max_severity: run.profile.max_severity(),
            summary: DischargeSummary::from_decision(&run.decision),
            decided_at: run.decided_at,
        }
    }

    /// Every issue of the run, effective severity applied
    pub fn all_issues(&self) -> impl Iterator<Item = &Issue> {
        self.sources.iter().flat_map(|s| s.issues.iter())
    }

    /// Next steps for staff: remediation actions in ranked order.
    pub fn next_steps(&self) -> Vec<String> {
        if self.approved {
            return vec!["Proceed with discharge procedures".to_string()];
        }
        self.remediation_items
            .iter()
            .map(|item| {
                if item.suggested_action.is_empty() {
                    format!("Resolve {}", item.code)
                } else {
                    item.suggested_action.clone()
                }
            })
            .collect()
    }
}

/// Sink for completed runs.
pub trait Persistence: Send + Sync {
    /// Store a decision and its audit trail, returning the paths written.
    fn save(
        &self,
        record: &DecisionRecord,
        audit: &AuditTrail,
        patient_id: &str,
    ) -> Result<Vec<PathBuf>, PersistenceError>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl Persistence for NullStore {
    fn save(
        &self,
        _record: &DecisionRecord,
        _audit: &AuditTrail,
        _patient_id: &str,
    ) -> Result<Vec<PathBuf>, PersistenceError> {
        Ok(Vec::new())
    }
}

#[derive(Serialize)]
struct StateFile<'a> {
    #[serde(flatten)]
    record: &'a DecisionRecord,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuditLogEntry {
    timestamp: DateTime<Utc>,
    patient_id: String,
    final_decision: Outcome,
    issues_count: usize,
    critical_issues: Vec<Issue>,
    recommended_next_steps: Vec<String>,
    checks: Vec<serde_json::Value>,
}

/// Local JSON file backend: decision state, append-only audit log and
/// department escalations.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    output_dir: PathBuf,
    escalations_dir: PathBuf,
    approval_expiry_hours: u32,
}

impl JsonFileStore {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        escalations_dir: impl Into<PathBuf>,
        approval_expiry_hours: u32,
    ) -> Self {
        JsonFileStore {
            output_dir: output_dir.into(),
            escalations_dir: escalations_dir.into(),
            approval_expiry_hours,
        }
    }

    pub fn state_path(&self, patient_id: &str) -> PathBuf {
        self.output_dir
            .join(format!("discharge_state_{}.json", patient_id))
    }

    pub fn audit_log_path(&self, patient_id: &str) -> PathBuf {
        self.output_dir
            .join(format!("discharge_audit_log_{}.json", patient_id))
    }

    /// Approval deadline, `None` unless the record is approved.
    fn expires_at(&self, record: &DecisionRecord) -> Result<Option<DateTime<Utc>>, PersistenceError> {
        if !record.approved {
            return Ok(None);
        }
        let hours = self.approval_expiry_hours;
        Duration::try_hours(i64::from(hours))
            .and_then(|expiry| record.decided_at.checked_add_signed(expiry))
            .map(Some)
            .ok_or(PersistenceError::ExpiryOverflow { hours })
    }

    fn write_state(&self, record: &DecisionRecord) -> Result<PathBuf, PersistenceError> {
        let expires_at = self.expires_at(record)?;
        let path = self.state_path(&record.patient_id);
        write_json(&path, &StateFile { record, expires_at })?;
        Ok(path)
    }

    fn append_audit(
        &self,
        record: &DecisionRecord,
        audit: &AuditTrail,
    ) -> Result<PathBuf, PersistenceError> {
        let path = self.audit_log_path(&record.patient_id);

        let mut log: Vec<AuditLogEntry> = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| PersistenceError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(PersistenceError::Io { path, source }),
        };

        let checks = audit
            .events
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| PersistenceError::Json {
                path: path.clone(),
                source,
            })?;

        log.push(AuditLogEntry {
            timestamp: record.decided_at,
            patient_id: record.patient_id.clone(),
            final_decision: record.outcome,
            issues_count: record.all_issues().count(),
            critical_issues: record
                .all_issues()
                .filter(|i| i.severity == Severity::Critical)
                .cloned()
                .collect(),
            recommended_next_steps: record.next_steps(),
            checks,
        });

        write_json(&path, &log)?;
        Ok(path)
    }
}

impl Persistence for JsonFileStore {
    fn save(
        &self,
        record: &DecisionRecord,
        audit: &AuditTrail,
        patient_id: &str,
    ) -> Result<Vec<PathBuf>, PersistenceError> {
        if !is_valid_patient_id(patient_id) || record.patient_id != patient_id {
            return Err(PersistenceError::UnsafePatientId(patient_id.to_string()));
        }
        debug!(patient_id, dir = %self.output_dir.display(), "persisting decision");

        // The three outputs are independent: a failed audit append must not
        // cost the departments their escalations.
        let mut written = Vec::new();
        let mut errors = Vec::new();

        match self.write_state(record) {
            Ok(path) => written.push(path),
            Err(e) => errors.push(e),
        }
        match self.append_audit(record, audit) {
            Ok(path) => written.push(path),
            Err(e) => errors.push(e),
        }
        match escalation::write_escalations(&self.escalations_dir, record) {
            Ok(paths) => written.extend(paths),
            Err(e) => errors.push(e),
        }

        match errors.len() {
            0 => Ok(written),
            1 => Err(errors.remove(0)),
            _ => Err(PersistenceError::Multiple(errors)),
        }
    }
}

/// Pretty-print `value` to `path`, creating parent directories.
pub(crate) fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let text = serde_json::to_string_pretty(value).map_err(|source| PersistenceError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    fs::write(path, text).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}
