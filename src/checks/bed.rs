//! Bed management clearance: final invoice, outstanding payment, refunds
//! and bed turnover.

use super::{evidence, load_record};
use crate::data::records::{PatientRecord, RecordStore};
use crate::engine::finding::{Finding, Issue, Severity, Source};
use crate::engine::runner::{Check, CheckUnavailable};
use std::sync::Arc;

pub struct BedCheck {
    store: Arc<RecordStore>,
}

impl BedCheck {
    pub fn new(store: Arc<RecordStore>) -> Self {
        BedCheck { store }
    }
}

impl Check for BedCheck {
    fn source(&self) -> Source {
        Source::Bed
    }

    fn description(&self) -> &str {
        "Verify final invoice, outstanding payments and housekeeping schedule"
    }

    fn run(&self, patient_id: &str) -> Result<Finding, CheckUnavailable> {
        let record = load_record(&self.store, Source::Bed, patient_id)?;
        Ok(evaluate(&record))
    }
}

pub fn evaluate(record: &PatientRecord) -> Finding {
    let pid = &record.patient_id;
    let mut issues = Vec::new();

    let Some(billing) = &record.billing else {
        issues.push(
            Issue::new(
                "BED_INVOICE_PENDING",
                Severity::High,
                "Unable to verify billing status: billing snapshot not available",
            )
            .with_title("Billing Data Missing")
            .with_action("Generate final invoice through billing system")
            .with_evidence(evidence(pid, "billing")),
        );
        return Finding::from_issues(Source::Bed, issues);
    };

    if !billing.invoice_generated {
        let status = if billing.invoice_status.is_empty() {
            "pending"
        } else {
            billing.invoice_status.as_str()
        };
        issues.push(
            Issue::new(
                "BED_INVOICE_PENDING",
                Severity::High,
                format!("Invoice status: {}", status),
            )
            .with_title("Final Invoice Not Generated")
            .with_action("Generate final invoice via Billing UI before discharge")
            .with_evidence(evidence(pid, "billing.invoice_generated")),
        );
    }

    if billing.required_before_discharge > 0.0 {
        let amount = billing.required_before_discharge;
        issues.push(
            Issue::new(
                "BED_DEPOSIT_SHORTFALL",
                Severity::High,
                format!("Patient needs to pay {:.2} before discharge", amount),
            )
            .with_title("Payment Required Before Discharge")
            .with_action(format!("Collect {:.2} from patient/family", amount))
            .with_evidence(evidence(pid, "billing.required_before_discharge")),
        );
    } else if billing.refund_due > 0.0 {
        issues.push(
            Issue::new(
                "BED_REFUND_DUE",
                Severity::Low,
                format!("Refund of {:.2} due to patient", billing.refund_due),
            )
            .with_title("Deposit Refund Due")
            .with_action("Process refund after final invoice generation")
            .with_evidence(evidence(pid, "billing.refund_due"))
            .auto_resolvable(),
        );
    }

    let cleaning_scheduled = record
        .housekeeping
        .as_ref()
        .is_some_and(|h| h.cleaning_scheduled);
    if !cleaning_scheduled {
        issues.push(
            Issue::new(
                "BED_CLEANUP_DELAY",
                Severity::Medium,
                "Bed cleaning schedule not found",
            )
            .with_title("Housekeeping Not Scheduled")
            .with_action("Schedule terminal cleaning for bed turnover")
            .with_evidence(evidence(pid, "housekeeping"))
            .auto_resolvable(),
        );
    }

    Finding::from_issues(Source::Bed, issues)
}
