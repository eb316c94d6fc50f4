//! Rule-based discharge checks.
//!
//! One module per source:
//! - Insurance: policy status, pre-authorization, co-pay
//! - Pharmacy: pending orders, medication payment, allergy conflicts
//! - Ambulance: transport need and provider availability
//! - Bed: invoice, deposit, refund, housekeeping
//! - Lab: required tests and critical values
//!
//! # Graceful Degradation
//!
//! A missing department section in the patient record is a finding of the
//! check itself (usually `*_DATA_MISSING`, HIGH). Only a record that cannot be
//! loaded at all makes a check unavailable, and the coordinator substitutes
//! an ERROR finding for it.
//!
//! Each check splits into a pure `evaluate(&PatientRecord) -> Finding` and a
//! thin `Check` impl that loads the record.

pub mod ambulance;
pub mod bed;
pub mod insurance;
pub mod lab;
pub mod pharmacy;

use crate::data::records::{PatientRecord, RecordStore};
use crate::engine::finding::Source;
use crate::engine::runner::{Check, CheckUnavailable};
use std::sync::Arc;

pub use ambulance::AmbulanceCheck;
pub use bed::BedCheck;
pub use insurance::InsuranceCheck;
pub use lab::LabCheck;
pub use pharmacy::PharmacyCheck;

/// All five checks, in canonical source order, sharing one record store.
pub fn create_all_checks(store: Arc<RecordStore>) -> Vec<Arc<dyn Check>> {
    vec![
        Arc::new(InsuranceCheck::new(Arc::clone(&store))),
        Arc::new(PharmacyCheck::new(Arc::clone(&store))),
        Arc::new(AmbulanceCheck::new(Arc::clone(&store))),
        Arc::new(BedCheck::new(Arc::clone(&store))),
        Arc::new(LabCheck::new(store)),
    ]
}

/// Load the record on behalf of `source`, mapping failures to
/// `CheckUnavailable::Data`.
fn load_record(
    store: &RecordStore,
    source: Source,
    patient_id: &str,
) -> Result<PatientRecord, CheckUnavailable> {
    store
        .load(patient_id)
        .map_err(|e| CheckUnavailable::Data {
            check: source,
            reason: e.to_string(),
        })
}

/// Evidence pointer into a patient record
fn evidence(patient_id: &str, field: &str) -> String {
    format!("{}.json#{}", patient_id, field)
}
