//! Pharmacy clearance: pending orders, medication payment and
//! allergy-medication conflicts.

use super::{evidence, load_record};
use crate::data::records::{PatientRecord, RecordStore};
use crate::engine::finding::{Finding, Issue, Severity, Source};
use crate::engine::runner::{Check, CheckUnavailable};
use std::sync::Arc;

pub struct PharmacyCheck {
    store: Arc<RecordStore>,
}

impl PharmacyCheck {
    pub fn new(store: Arc<RecordStore>) -> Self {
        PharmacyCheck { store }
    }
}

impl Check for PharmacyCheck {
    fn source(&self) -> Source {
        Source::Pharmacy
    }

    fn description(&self) -> &str {
        "Verify medication orders are dispensed, paid for and free of allergy conflicts"
    }

    fn run(&self, patient_id: &str) -> Result<Finding, CheckUnavailable> {
        let record = load_record(&self.store, Source::Pharmacy, patient_id)?;
        Ok(evaluate(&record))
    }
}

pub fn evaluate(record: &PatientRecord) -> Finding {
    let pid = &record.patient_id;
    let mut issues = Vec::new();

    let Some(pharmacy) = &record.pharmacy else {
        return Finding::granted(Source::Pharmacy);
    };

    for order in pharmacy.active_orders.iter().filter(|o| o.is_pending()) {
        issues.push(
            Issue::new(
                "PHARM_ORDER_PENDING",
                Severity::High,
                format!(
                    "Medication '{}' order is pending dispense",
                    order.medication_name
                ),
            )
            .with_title("Pending Medication Order")
            .with_action("Dispense medication before discharge")
            .with_evidence(evidence(pid, &format!("pharmacy.active_orders[{}]", order.order_id))),
        );
    }

    if pharmacy.discharge_medication_cost > 0.0 {
        let cost = pharmacy.discharge_medication_cost;
        issues.push(
            Issue::new(
                "PHARM_PAYMENT_PENDING",
                Severity::Medium,
                format!("Patient needs to pay {:.2} for discharge medications", cost),
            )
            .with_title("Discharge Medication Payment Required")
            .with_action(format!("Collect {:.2} from patient/family before discharge", cost))
            .with_evidence(evidence(pid, "pharmacy.discharge_medication_cost")),
        );
    }

    for contraindication in &pharmacy.allergy_contraindications {
        let allergy = contraindication.allergy.to_lowercase();
        let patient_has_allergy = record
            .patient
            .allergies
            .iter()
            .map(|a| a.to_lowercase())
            .filter(|a| !a.is_empty())
            .any(|a| !allergy.is_empty() && (a.contains(&allergy) || allergy.contains(&a)));
        if !patient_has_allergy {
            continue;
        }

        for med in &record.patient.medications {
            let name = med.name.to_lowercase();
            let conflicting = contraindication
                .contraindicated_drugs
                .iter()
                .any(|drug| !drug.is_empty() && name.contains(&drug.to_lowercase()));
            if conflicting {
                issues.push(
                    Issue::new(
                        "PHARM_ALLERGY_CONFLICT",
                        Severity::Critical,
                        format!(
                            "Patient has {} but is on {}, which may be contraindicated",
                            contraindication.allergy, med.name
                        ),
                    )
                    .with_title("Allergy-Medication Conflict")
                    .with_action("Consult physician for alternative medication")
                    .with_evidence(evidence(pid, "patient.medications")),
                );
            }
        }
    }

    Finding::from_issues(Source::Pharmacy, issues)
}
