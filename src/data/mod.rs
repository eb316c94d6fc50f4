//! Patient record data.
//!
//! The JSON record store the rule-based checks read from.

pub mod records;

pub use records::{is_valid_patient_id, PatientRecord, RecordError, RecordStore};
