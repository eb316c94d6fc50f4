//! Patient record store.
//!
//! One JSON document per patient at `<data_dir>/<patient_id>.json`. Every
//! department section is optional; a check treats a missing section as its
//! own finding rather than a load failure.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid patient id '{0}'")]
    InvalidPatientId(String),

    #[error("no record for patient at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("record at {} belongs to patient '{found}'", path.display())]
    PatientMismatch { path: PathBuf, found: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientInfo {
    pub name: String,
    pub age: Option<u32>,
    pub diagnosis: String,
    pub allergies: Vec<String>,
    pub medications: Vec<Medication>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    #[serde(default)]
    pub dose: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsuranceRecord {
    pub policy_number: String,
    pub policy_status: String,
    pub pre_authorizations: Vec<PreAuthorization>,
    pub copay_due: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreAuthorization {
    #[serde(default)]
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PharmacyRecord {
    pub active_orders: Vec<MedicationOrder>,
    pub discharge_medication_cost: f64,
    pub allergy_contraindications: Vec<Contraindication>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationOrder {
    pub order_id: String,
    pub medication_name: String,
    pub status: String,
}

impl MedicationOrder {
    pub fn is_pending(&self) -> bool {
        self.status.eq_ignore_ascii_case("pending")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contraindication {
    pub allergy: String,
    pub contraindicated_drugs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportRecord {
    pub providers: Vec<TransportProvider>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportProvider {
    pub name: String,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_type: String,
    pub available: bool,
    pub eta_minutes: u32,
    #[serde(default)]
    pub cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingRecord {
    pub invoice_generated: bool,
    pub invoice_status: String,
    pub required_before_discharge: f64,
    pub refund_due: f64,
    /// Billed line item descriptions
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HousekeepingRecord {
    pub cleaning_scheduled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabRecord {
    pub required_tests: Vec<String>,
    pub results: Vec<LabResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabStatus {
    Pending,
    Completed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentFlag {
    #[default]
    Normal,
    Low,
    High,
    Critical,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    #[serde(default)]
    pub test_id: String,
    pub test_name: String,
    pub status: LabStatus,
    #[serde(default)]
    pub components: Vec<LabComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabComponent {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub reference_range: String,
    #[serde(default)]
    pub flag: ComponentFlag,
}

/// Everything the five checks know about one admission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_id: String,
    #[serde(default)]
    pub patient: PatientInfo,
    #[serde(default)]
    pub insurance: Option<InsuranceRecord>,
    #[serde(default)]
    pub pharmacy: Option<PharmacyRecord>,
    #[serde(default)]
    pub transport: Option<TransportRecord>,
    #[serde(default)]
    pub billing: Option<BillingRecord>,
    #[serde(default)]
    pub housekeeping: Option<HousekeepingRecord>,
    #[serde(default)]
    pub labs: Option<LabRecord>,
}

/// Patient ids are restricted to ASCII letters, digits, `-` and `_`: they
/// name files under the record, state and escalation directories and must
/// not be able to escape them.
pub fn is_valid_patient_id(patient_id: &str) -> bool {
    !patient_id.is_empty()
        && patient_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Read-only view over a directory of patient records.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        RecordStore {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a patient's record.
    pub fn record_path(&self, patient_id: &str) -> Result<PathBuf, RecordError> {
        if !is_valid_patient_id(patient_id) {
            return Err(RecordError::InvalidPatientId(patient_id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", patient_id)))
    }

    pub fn load(&self, patient_id: &str) -> Result<PatientRecord, RecordError> {
        let path = self.record_path(patient_id)?;
        debug!(patient_id, path = %path.display(), "loading patient record");

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RecordError::NotFound { path });
            }
            Err(source) => return Err(RecordError::Io { path, source }),
        };

        let record: PatientRecord = serde_json::from_str(&text)
            .map_err(|source| RecordError::Parse {
                path: path.clone(),
                source,
            })?;

        if record.patient_id != patient_id {
            return Err(RecordError::PatientMismatch {
                path,
                found: record.patient_id,
            });
        }

        Ok(record)
    }

    /// Ids of every record in the store, sorted
    pub fn patient_ids(&self) -> Result<Vec<String>, RecordError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| RecordError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        ids.sort();
        Ok(ids)
    }
}
