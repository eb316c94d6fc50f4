//! discharge-preflight library
//!
//! Patient discharge verification: five independent checks (insurance,
//! pharmacy, ambulance, bed management, lab) are fanned out against a
//! patient record, their findings are aggregated into a severity profile,
//! and a deterministic decision engine derives one of three outcomes:
//! APPROVE, HOLD or PENDING_AUTO_RESOLUTION, together with a ranked
//! remediation list.
//!
//! The library is split into:
//! - `engine`: findings, aggregation, the decision cascade, the check runner
//!   and the coordinator that drives them
//! - `checks`: rule-based reference implementations of the five checks
//! - `data`: the JSON patient record store the checks read from
//! - `persist`: decision state, audit log and department escalations
//! - `cli`: argument parsing and output formatting for the binary
//! - `service`: the HTTP verification endpoint served by `discharge-preflight serve`
//!
//! # Example
//!
//! ```no_run
//! use discharge_preflight::{run_discharge, CancelFlag, DischargeConfig};
//!
//! let config = DischargeConfig::default();
//! let run = run_discharge(&config, "P00231", &CancelFlag::new()).expect("run failed");
//! println!("Outcome: {}", run.decision.outcome);
//! ```

pub mod checks;
pub mod cli;
pub mod config;
pub mod data;
pub mod engine;
pub mod persist;
pub mod service;
pub mod version;

use std::sync::Arc;

use data::records::RecordStore;
use engine::coordinator::{Coordinator, CoordinatorRun};
use engine::runner::{CheckOrchestrator, RunnerConfig};
use persist::{JsonFileStore, NullStore, Persistence};

// Re-exports for public API
pub use config::{ConfigError, DischargeConfig};
pub use engine::aggregator::{aggregate, SeverityCounts, SeverityProfile};
pub use engine::decision::{decide, Decision, Outcome, RemediationItem};
pub use engine::finding::{Finding, Issue, Severity, Source, Status};
pub use engine::runner::{CancelFlag, Check, CheckRunner, CheckUnavailable};

/// Error types for a discharge run.
///
/// Per-source check failures are not represented here: they are recovered
/// inside the run by substitution (see [`CheckUnavailable`]). Persistence
/// failures are logged and never reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum DischargeError {
    /// The finding set handed to the aggregator or decision engine was
    /// malformed or incomplete. Indicates a caller bug, never retried.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// The run was cancelled before every check reported.
    #[error("run for patient '{patient_id}' cancelled before all checks reported")]
    Cancelled { patient_id: String },

    /// Patient identifier rejected before any check was dispatched.
    #[error("invalid patient id '{0}'")]
    InvalidPatientId(String),

    /// Configuration could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DischargeError {
    pub(crate) fn contract(message: impl Into<String>) -> Self {
        DischargeError::ContractViolation(message.into())
    }

    /// True for the programming-error class that must be surfaced distinctly
    /// from a clinical HOLD.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, DischargeError::ContractViolation(_))
    }
}

/// Build a coordinator wired to the rule-based checks and the configured
/// persistence backend.
pub fn build_coordinator(config: &DischargeConfig) -> Result<Coordinator, DischargeError> {
    config.validate()?;

    let store = Arc::new(RecordStore::new(&config.data_dir));
    let mut orchestrator = CheckOrchestrator::new(RunnerConfig {
        parallel: config.parallel,
        timeout_ms: config.timeout_ms,
    });
    orchestrator.register_checks(checks::create_all_checks(store));

    let persistence: Box<dyn Persistence> = if config.persist {
        Box::new(JsonFileStore::new(
            &config.output_dir,
            &config.escalations_dir,
            config.approval_expiry_hours,
        ))
    } else {
        Box::new(NullStore)
    };

    Ok(Coordinator::new(Box::new(orchestrator), persistence))
}

/// Run the full discharge verification for one patient.
///
/// This is the entry point used by the CLI and the HTTP service.
///
/// # Errors
///
/// Returns `DischargeError::Cancelled` if `cancel` fires before all five
/// checks report, `DischargeError::ContractViolation` if a check produced a
/// malformed finding set, `DischargeError::InvalidPatientId` for an id that
/// is blank or not path-safe, and `DischargeError::Config` for invalid
/// configuration.
pub fn run_discharge(
    config: &DischargeConfig,
    patient_id: &str,
    cancel: &CancelFlag,
) -> Result<CoordinatorRun, DischargeError> {
    let coordinator = build_coordinator(config)?;
    coordinator.run_detailed(patient_id, cancel)
}
