//! Ambulance clearance: does the patient need transport, and can it be
//! booked.

use super::{evidence, load_record};
use crate::data::records::{PatientRecord, RecordStore};
use crate::engine::finding::{Finding, Issue, Severity, Source};
use crate::engine::runner::{Check, CheckUnavailable};
use std::sync::Arc;

/// Providers further out than this do not count as available
const MAX_ETA_MINUTES: u32 = 120;

pub struct AmbulanceCheck {
    store: Arc<RecordStore>,
}

impl AmbulanceCheck {
    pub fn new(store: Arc<RecordStore>) -> Self {
        AmbulanceCheck { store }
    }
}

impl Check for AmbulanceCheck {
    fn source(&self) -> Source {
        Source::Ambulance
    }

    fn description(&self) -> &str {
        "Determine whether ambulance transport is needed and a provider can be booked"
    }

    fn run(&self, patient_id: &str) -> Result<Finding, CheckUnavailable> {
        let record = load_record(&self.store, Source::Ambulance, patient_id)?;
        Ok(evaluate(&record))
    }
}

/// Oncology patients and patients on dialysis leave by ambulance.
pub fn transport_required(record: &PatientRecord) -> bool {
    let oncology = record.patient.diagnosis.to_lowercase().contains("cancer");
    let dialysis = record.billing.as_ref().is_some_and(|b| {
        b.items
            .iter()
            .any(|item| item.to_lowercase().contains("dialysis"))
    });
    oncology || dialysis
}

struct Booking<'a> {
    provider: &'a str,
    vehicle: &'a str,
    eta_minutes: u32,
    cost: f64,
}

/// Fastest available vehicle within the ETA limit; first listed wins ties.
fn best_booking(record: &PatientRecord) -> Option<Booking<'_>> {
    let transport = record.transport.as_ref()?;
    let mut best: Option<Booking> = None;

    for provider in &transport.providers {
        for vehicle in &provider.vehicles {
            if !vehicle.available || vehicle.eta_minutes >= MAX_ETA_MINUTES {
                continue;
            }
            if best.as_ref().is_some_and(|b| b.eta_minutes <= vehicle.eta_minutes) {
                continue;
            }
            best = Some(Booking {
                provider: &provider.name,
                vehicle: &vehicle.vehicle_type,
                eta_minutes: vehicle.eta_minutes,
                cost: vehicle.cost,
            });
        }
    }

    best
}

pub fn evaluate(record: &PatientRecord) -> Finding {
    if !transport_required(record) {
        return Finding::granted(Source::Ambulance);
    }

    let pid = &record.patient_id;
    let issue = match best_booking(record) {
        Some(booking) => Issue::new(
            "TRANSPORT_REQUIRED",
            Severity::Medium,
            format!(
                "Patient with {} should have ambulance transport arranged",
                record.patient.diagnosis.to_lowercase()
            ),
        )
        .with_title("Ambulance Transport Recommended")
        .with_action(format!(
            "Book {} from {} (ETA: {} min, Cost: {:.2})",
            booking.vehicle, booking.provider, booking.eta_minutes, booking.cost
        ))
        .with_evidence(evidence(pid, "transport.providers"))
        .auto_resolvable(),
        None => Issue::new(
            "TRANSPORT_UNAVAILABLE",
            Severity::High,
            "Transport required but no providers available within 2 hours",
        )
        .with_title("No Ambulance Available")
        .with_action("Contact private ambulance services or delay discharge")
        .with_evidence(evidence(pid, "transport.providers")),
    };

    Finding::blocked(Source::Ambulance, vec![issue])
}
