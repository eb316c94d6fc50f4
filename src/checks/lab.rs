//! Lab clearance: required tests resulted and no critical values.

use super::{evidence, load_record};
use crate::data::records::{ComponentFlag, LabStatus, PatientRecord, RecordStore};
use crate::engine::finding::{Finding, Issue, Severity, Source};
use crate::engine::runner::{Check, CheckUnavailable};
use std::sync::Arc;

pub struct LabCheck {
    store: Arc<RecordStore>,
}

impl LabCheck {
    pub fn new(store: Arc<RecordStore>) -> Self {
        LabCheck { store }
    }
}

impl Check for LabCheck {
    fn source(&self) -> Source {
        Source::Lab
    }

    fn description(&self) -> &str {
        "Verify required tests are resulted and no component is critical"
    }

    fn run(&self, patient_id: &str) -> Result<Finding, CheckUnavailable> {
        let record = load_record(&self.store, Source::Lab, patient_id)?;
        Ok(evaluate(&record))
    }
}

pub fn evaluate(record: &PatientRecord) -> Finding {
    let pid = &record.patient_id;
    let mut issues = Vec::new();

    let Some(labs) = &record.labs else {
        issues.push(
            Issue::new(
                "LAB_DATA_MISSING",
                Severity::High,
                "Unable to verify lab tests: results not available",
            )
            .with_title("Lab Results Not Available")
            .with_action("Retrieve lab results from laboratory system")
            .with_evidence(evidence(pid, "labs")),
        );
        return Finding::from_issues(Source::Lab, issues);
    };

    for test in &labs.required_tests {
        let Some(result) = labs.results.iter().find(|r| &r.test_name == test) else {
            issues.push(
                Issue::new(
                    "LAB_PENDING",
                    Severity::High,
                    format!("Required test '{}' not found in results", test),
                )
                .with_title(format!("Missing Test: {}", test))
                .with_action("Complete the required test before discharge")
                .with_evidence(evidence(pid, "labs.required_tests")),
            );
            continue;
        };

        if result.status == LabStatus::Pending {
            issues.push(
                Issue::new(
                    "LAB_PENDING",
                    Severity::High,
                    format!("Test '{}' is still pending", test),
                )
                .with_title(format!("Pending Test: {}", test))
                .with_action("Wait for test completion or expedite processing")
                .with_evidence(evidence(pid, &format!("labs.results[{}]", result.test_id))),
            );
            continue;
        }

        for component in result
            .components
            .iter()
            .filter(|c| c.flag == ComponentFlag::Critical)
        {
            issues.push(
                Issue::new(
                    "LAB_CRITICAL_VALUE",
                    Severity::Critical,
                    format!(
                        "{} = {} {} (Reference: {})",
                        component.name, component.value, component.units, component.reference_range
                    ),
                )
                .with_title(format!("Critical Value: {}", component.name))
                .with_action("Consult physician before discharge: critical lab value requires review")
                .with_evidence(evidence(
                    pid,
                    &format!("labs.results[{}].components", result.test_id),
                )),
            );
        }
    }

    Finding::from_issues(Source::Lab, issues)
}
