//! Department escalation alerts.
//!
//! Every outstanding issue of a run is routed to the department that owns
//! it (by issue code prefix) and written under
//! `<escalations_dir>/patient_<pid>/`:
//! - one `<department>.json` per department with its alerts
//! - `patient_notifications.json` for urgent and high priority alerts
//! - `escalation_summary_<pid>.json`

use crate::engine::decision::Outcome;
use crate::engine::finding::Severity;
use crate::persist::{write_json, DecisionRecord, PersistenceError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Department {
    LabPortal,
    PharmacyPortal,
    BillingPortal,
    TransportServices,
    InsuranceDesk,
    GeneralOperations,
}

impl Department {
    const PREFIXES: [(&'static str, Department); 6] = [
        ("LAB_", Department::LabPortal),
        ("PHARM_", Department::PharmacyPortal),
        ("BED_", Department::BillingPortal),
        ("BILLING_", Department::BillingPortal),
        ("TRANSPORT_", Department::TransportServices),
        ("INS_", Department::InsuranceDesk),
    ];

    /// Route an issue code to its owning department
    pub fn for_code(code: &str) -> Department {
        Self::PREFIXES
            .iter()
            .find(|(prefix, _)| code.starts_with(prefix))
            .map_or(Department::GeneralOperations, |(_, dept)| *dept)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Department::LabPortal => "Lab Portal",
            Department::PharmacyPortal => "Pharmacy Portal",
            Department::BillingPortal => "Billing Portal",
            Department::TransportServices => "Transport Services",
            Department::InsuranceDesk => "Insurance Desk",
            Department::GeneralOperations => "General Operations",
        }
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            Department::LabPortal => "lab_portal",
            Department::PharmacyPortal => "pharmacy_portal",
            Department::BillingPortal => "billing_portal",
            Department::TransportServices => "transport_services",
            Department::InsuranceDesk => "insurance_desk",
            Department::GeneralOperations => "general_operations",
        }
    }

    /// Three-letter tag used in alert ids
    pub fn abbrev(&self) -> &'static str {
        match self {
            Department::LabPortal => "LAB",
            Department::PharmacyPortal => "PHA",
            Department::BillingPortal => "BIL",
            Department::TransportServices => "TRA",
            Department::InsuranceDesk => "INS",
            Department::GeneralOperations => "GEN",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Department {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Alert priority. Declaration order is most to least pressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    Normal,
    Low,
}

impl Priority {
    pub fn from_severity(severity: Severity) -> Priority {
        match severity {
            Severity::Critical => Priority::Urgent,
            Severity::High => Priority::High,
            Severity::Low => Priority::Low,
            Severity::Medium | Severity::None => Priority::Normal,
        }
    }

    /// Urgent and high alerts are also surfaced to the patient
    pub fn notifies_patient(&self) -> bool {
        matches!(self, Priority::Urgent | Priority::High)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationAlert {
    pub alert_id: String,
    pub patient_id: String,
    pub department: Department,
    pub priority: Priority,
    pub issue_code: String,
    pub issue_title: String,
    pub message: String,
    pub suggested_action: String,
    pub evidence: Vec<String>,
    pub escalated_at: DateTime<Utc>,
    pub status: &'static str,
}

impl EscalationAlert {
    fn patient_message(&self) -> String {
        let title = if self.issue_title.is_empty() {
            self.issue_code.as_str()
        } else {
            self.issue_title.as_str()
        };
        match self.department {
            Department::LabPortal => format!(
                "Your {} needs attention. Please contact the lab.",
                title.to_lowercase()
            ),
            Department::BillingPortal => format!(
                "There is a billing matter that needs your attention: {}",
                self.message
            ),
            Department::PharmacyPortal => {
                format!("Your medication {} requires action.", title.to_lowercase())
            }
            Department::InsuranceDesk => {
                format!("Please contact the insurance desk regarding: {}", title)
            }
            Department::TransportServices | Department::GeneralOperations => self.message.clone(),
        }
    }
}

/// Build one alert per outstanding issue, in canonical source order.
/// Alert ids are numbered per run, so identical runs yield identical ids.
pub fn build_alerts(record: &DecisionRecord) -> Vec<EscalationAlert> {
    record
        .sources
        .iter()
        .flat_map(|s| s.issues.iter())
        .enumerate()
        .map(|(n, issue)| {
            let department = Department::for_code(&issue.code);
            EscalationAlert {
                alert_id: format!(
                    "ALERT-{}-{}-{:03}",
                    record.patient_id,
                    department.abbrev(),
                    n + 1
                ),
                patient_id: record.patient_id.clone(),
                department,
                priority: Priority::from_severity(issue.severity),
                issue_code: issue.code.clone(),
                issue_title: issue.title.clone(),
                message: issue.description.clone(),
                suggested_action: issue.suggested_action.clone(),
                evidence: issue.evidence.clone(),
                escalated_at: record.decided_at,
                status: "pending",
            }
        })
        .collect()
}

#[derive(Serialize)]
struct DepartmentFile<'a> {
    department: Department,
    patient_id: &'a str,
    alerts: Vec<&'a EscalationAlert>,
    total_alerts: usize,
    highest_priority: Priority,
    generated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct PatientNotification<'a> {
    priority: Priority,
    title: &'a str,
    message: String,
    action_required: &'a str,
    department: Department,
}

#[derive(Serialize)]
struct NotificationFile<'a> {
    patient_id: &'a str,
    notifications: Vec<PatientNotification<'a>>,
    total_notifications: usize,
    generated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct PriorityCounts {
    urgent: usize,
    high: usize,
    normal: usize,
    low: usize,
}

#[derive(Serialize)]
struct SummaryFile<'a> {
    patient_id: &'a str,
    final_decision: Outcome,
    total_alerts: usize,
    alerts_by_priority: PriorityCounts,
    departments_involved: Vec<Department>,
    department_summary: BTreeMap<&'static str, usize>,
    generated_at: DateTime<Utc>,
}

/// Write the escalation files for one run. Writes nothing when the run has
/// no outstanding issues.
pub fn write_escalations(
    escalations_dir: &Path,
    record: &DecisionRecord,
) -> Result<Vec<PathBuf>, PersistenceError> {
    let alerts = build_alerts(record);
    if alerts.is_empty() {
        return Ok(Vec::new());
    }

    let patient_dir = escalations_dir.join(format!("patient_{}", record.patient_id));
    let mut written = Vec::new();

    let mut by_department: BTreeMap<Department, Vec<&EscalationAlert>> = BTreeMap::new();
    for alert in &alerts {
        by_department.entry(alert.department).or_default().push(alert);
    }

    for (department, dept_alerts) in &by_department {
        let highest_priority = dept_alerts
            .iter()
            .map(|a| a.priority)
            .min()
            .unwrap_or(Priority::Low);
        let file = DepartmentFile {
            department: *department,
            patient_id: &record.patient_id,
            alerts: dept_alerts.clone(),
            total_alerts: dept_alerts.len(),
            highest_priority,
            generated_at: record.decided_at,
        };
        let path = patient_dir.join(format!("{}.json", department.file_stem()));
        write_json(&path, &file)?;
        written.push(path);
    }

    let notifications: Vec<PatientNotification> = alerts
        .iter()
        .filter(|a| a.priority.notifies_patient())
        .map(|a| PatientNotification {
            priority: a.priority,
            title: &a.issue_title,
            message: a.patient_message(),
            action_required: &a.suggested_action,
            department: a.department,
        })
        .collect();

    if !notifications.is_empty() {
        let file = NotificationFile {
            patient_id: &record.patient_id,
            total_notifications: notifications.len(),
            notifications,
            generated_at: record.decided_at,
        };
        let path = patient_dir.join("patient_notifications.json");
        write_json(&path, &file)?;
        written.push(path);
    }

    let count = |p: Priority| alerts.iter().filter(|a| a.priority == p).count();
    let summary = SummaryFile {
        patient_id: &record.patient_id,
        final_decision: record.outcome,
        total_alerts: alerts.len(),
        alerts_by_priority: PriorityCounts {
            urgent: count(Priority::Urgent),
            high: count(Priority::High),
            normal: count(Priority::Normal),
            low: count(Priority::Low),
        },
        departments_involved: by_department.keys().copied().collect(),
        department_summary: by_department
            .iter()
            .map(|(d, a)| (d.name(), a.len()))
            .collect(),
        generated_at: record.decided_at,
    };
    let path = patient_dir.join(format!("escalation_summary_{}.json", record.patient_id));
    write_json(&path, &summary)?;
    written.push(path);

    Ok(written)
}
