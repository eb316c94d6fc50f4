//! Insurance clearance: policy status, pre-authorization and co-pay.

use super::{evidence, load_record};
use crate::data::records::{PatientRecord, RecordStore};
use crate::engine::finding::{Finding, Issue, Severity, Source};
use crate::engine::runner::{Check, CheckUnavailable};
use std::sync::Arc;

pub struct InsuranceCheck {
    store: Arc<RecordStore>,
}

impl InsuranceCheck {
    pub fn new(store: Arc<RecordStore>) -> Self {
        InsuranceCheck { store }
    }
}

impl Check for InsuranceCheck {
    fn source(&self) -> Source {
        Source::Insurance
    }

    fn description(&self) -> &str {
        "Verify policy is active, pre-authorization approved and co-pay settled"
    }

    fn run(&self, patient_id: &str) -> Result<Finding, CheckUnavailable> {
        let record = load_record(&self.store, Source::Insurance, patient_id)?;
        Ok(evaluate(&record))
    }
}

pub fn evaluate(record: &PatientRecord) -> Finding {
    let pid = &record.patient_id;
    let mut issues = Vec::new();

    let Some(insurance) = &record.insurance else {
        issues.push(
            Issue::new(
                "INS_DATA_MISSING",
                Severity::High,
                "Unable to verify insurance: insurer records not available",
            )
            .with_title("Insurance Records Missing")
            .with_action("Contact insurance desk to verify policy manually")
            .with_evidence(evidence(pid, "insurance")),
        );
        return Finding::from_issues(Source::Insurance, issues);
    };

    if !insurance.policy_status.eq_ignore_ascii_case("active") {
        let status = if insurance.policy_status.is_empty() {
            "unknown"
        } else {
            insurance.policy_status.as_str()
        };
        issues.push(
            Issue::new(
                "INS_POLICY_EXPIRED",
                Severity::Critical,
                format!("Insurance policy status: {}", status),
            )
            .with_title("Policy Not Active")
            .with_action("Contact insurance provider to reactivate policy")
            .with_evidence(evidence(pid, "insurance.policy_status")),
        );
    }

    let preauth_approved = insurance
        .pre_authorizations
        .iter()
        .any(|p| p.status.eq_ignore_ascii_case("approved"));
    if !preauth_approved {
        issues.push(
            Issue::new(
                "INS_PREAUTH_MISSING",
                Severity::High,
                "No approved pre-authorization found for this admission",
            )
            .with_title("Pre-Authorization Missing")
            .with_action("Submit pre-authorization request to insurance")
            .with_evidence(evidence(pid, "insurance.pre_authorizations")),
        );
    }

    if insurance.copay_due > 0.0 {
        issues.push(
            Issue::new(
                "INS_PARTIAL_COVERAGE",
                Severity::Low,
                format!("Patient responsibility of {:.2} not covered by policy", insurance.copay_due),
            )
            .with_title("Co-pay Due")
            .with_action(format!("Collect co-pay of {:.2} from patient/family", insurance.copay_due))
            .with_evidence(evidence(pid, "insurance.copay_due")),
        );
    }

    Finding::from_issues(Source::Insurance, issues)
}
