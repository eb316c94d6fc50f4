//! Check execution.
//!
//! Fans the registered checks out against one patient and collects one
//! report per check.
//!
//! # Graceful Degradation
//!
//! No check failure escapes this module as a panic or an `Err` of the run:
//! - Check panics: caught via `std::panic::catch_unwind`, reported as
//!   `CheckUnavailable::Panicked`
//! - Check timeout: in parallel mode the check is abandoned once the run
//!   deadline passes; in sequential mode an overrunning check is reported
//!   after it returns
//! - Thread spawn failure: reported as `CheckUnavailable::Transport`
//!
//! Only cancellation aborts a run (`DischargeError::Cancelled`).

use crate::engine::finding::{Finding, Source};
use crate::DischargeError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Granularity at which a parallel run polls its cancel flag.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Why a check produced no finding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckUnavailable {
    #[error("{check} check timed out after {timeout_ms}ms")]
    Timeout { check: Source, timeout_ms: u64 },

    #[error("{check} check panicked during execution")]
    Panicked { check: Source },

    #[error("{check} record unavailable: {reason}")]
    Data { check: Source, reason: String },

    #[error("{check} check could not be dispatched: {reason}")]
    Transport { check: Source, reason: String },
}

impl CheckUnavailable {
    /// Source of the check that failed
    pub fn check(&self) -> Source {
        match self {
            CheckUnavailable::Timeout { check, .. }
            | CheckUnavailable::Panicked { check }
            | CheckUnavailable::Data { check, .. }
            | CheckUnavailable::Transport { check, .. } => *check,
        }
    }
}

/// One source of clearance for discharge.
///
/// Implementations must be independent of each other: no check may observe
/// another check's output.
pub trait Check: Send + Sync {
    fn source(&self) -> Source;

    /// One-line description for listings
    fn description(&self) -> &str;

    /// Evaluate the patient. The returned finding must carry `self.source()`.
    fn run(&self, patient_id: &str) -> Result<Finding, CheckUnavailable>;
}

/// Outcome of one dispatched check.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: Source,
    pub result: Result<Finding, CheckUnavailable>,
    pub duration_ms: u64,
}

/// Runs a set of checks for one patient. Implementations may return fewer
/// reports than there are sources; the coordinator substitutes the rest.
pub trait CheckRunner: Send + Sync {
    fn run_checks(
        &self,
        patient_id: &str,
        cancel: &CancelFlag,
    ) -> Result<Vec<SourceReport>, DischargeError>;
}

/// Cooperative cancellation shared between a caller and a running run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub parallel: bool,
    /// Deadline for the whole fan-out
    pub timeout_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            parallel: true,
            timeout_ms: 30_000,
        }
    }
}

/// Thread-per-check orchestrator.
pub struct CheckOrchestrator {
    config: RunnerConfig,
    checks: Vec<Arc<dyn Check>>,
}

impl CheckOrchestrator {
    pub fn new(config: RunnerConfig) -> Self {
        CheckOrchestrator {
            config,
            checks: Vec::new(),
        }
    }

    pub fn register_checks(&mut self, checks: Vec<Arc<dyn Check>>) {
        self.checks.extend(checks);
    }

    pub fn register_check(&mut self, check: Arc<dyn Check>) {
        self.checks.push(check);
    }

    /// Sources of the registered checks, in registration order
    pub fn sources(&self) -> Vec<Source> {
        self.checks.iter().map(|c| c.source()).collect()
    }

    fn run_sequential(
        &self,
        patient_id: &str,
        cancel: &CancelFlag,
    ) -> Result<Vec<SourceReport>, DischargeError> {
        let mut reports = Vec::with_capacity(self.checks.len());

        for check in &self.checks {
            if cancel.is_cancelled() {
                return Err(DischargeError::Cancelled {
                    patient_id: patient_id.to_string(),
                });
            }

            let report = execute_check(check.as_ref(), patient_id);
            let report = if report.duration_ms > self.config.timeout_ms {
                SourceReport {
                    result: Err(CheckUnavailable::Timeout {
                        check: report.source,
                        timeout_ms: self.config.timeout_ms,
                    }),
                    ..report
                }
            } else {
                report
            };
            reports.push(report);
        }

        Ok(reports)
    }

    fn run_parallel(
        &self,
        patient_id: &str,
        cancel: &CancelFlag,
    ) -> Result<Vec<SourceReport>, DischargeError> {
        let start = Instant::now();
        let deadline = start + Duration::from_millis(self.config.timeout_ms);
        let (tx, rx) = mpsc::channel::<(usize, SourceReport)>();

        let mut slots: Vec<Option<SourceReport>> = vec![None; self.checks.len()];
        let mut outstanding = 0usize;

        for (index, check) in self.checks.iter().enumerate() {
            let check = Arc::clone(check);
            let tx = tx.clone();
            let pid = patient_id.to_string();
            let source = check.source();

            // Detached: a check that overruns the deadline is abandoned, its
            // late report goes nowhere.
            let spawned = thread::Builder::new()
                .name(format!("check-{}", source))
                .spawn(move || {
                    let report = execute_check(check.as_ref(), &pid);
                    let _ = tx.send((index, report));
                });

            match spawned {
                Ok(_) => outstanding += 1,
                Err(e) => {
                    warn!(source = %source, error = %e, "failed to spawn check thread");
                    slots[index] = Some(SourceReport {
                        source,
                        result: Err(CheckUnavailable::Transport {
                            check: source,
                            reason: e.to_string(),
                        }),
                        duration_ms: 0,
                    });
                }
            }
        }
        drop(tx);

        while outstanding > 0 {
            if cancel.is_cancelled() {
                return Err(DischargeError::Cancelled {
                    patient_id: patient_id.to_string(),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }

            match rx.recv_timeout(POLL_INTERVAL.min(deadline - now)) {
                Ok((index, report)) => {
                    debug!(source = %report.source, duration_ms = report.duration_ms, "check reported");
                    slots[index] = Some(report);
                    outstanding -= 1;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let reports = self
            .checks
            .iter()
            .zip(slots)
            .map(|(check, slot)| {
                slot.unwrap_or_else(|| {
                    let source = check.source();
                    warn!(source = %source, timeout_ms = self.config.timeout_ms, "check did not report before deadline");
                    SourceReport {
                        source,
                        result: Err(CheckUnavailable::Timeout {
                            check: source,
                            timeout_ms: self.config.timeout_ms,
                        }),
                        duration_ms: elapsed_ms,
                    }
                })
            })
            .collect();

        Ok(reports)
    }
}

impl CheckRunner for CheckOrchestrator {
    fn run_checks(
        &self,
        patient_id: &str,
        cancel: &CancelFlag,
    ) -> Result<Vec<SourceReport>, DischargeError> {
        debug!(
            patient_id,
            checks = self.checks.len(),
            parallel = self.config.parallel,
            "dispatching checks"
        );
        if self.config.parallel {
            self.run_parallel(patient_id, cancel)
        } else {
            self.run_sequential(patient_id, cancel)
        }
    }
}

/// Run one check, converting a panic into `CheckUnavailable::Panicked` and
/// stamping the measured duration onto the finding.
fn execute_check(check: &dyn Check, patient_id: &str) -> SourceReport {
    let source = check.source();
    let start = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| check.run(patient_id)));
    let duration_ms = start.elapsed().as_millis() as u64;

    let result = match outcome {
        Ok(Ok(finding)) => Ok(finding.with_duration(duration_ms)),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(CheckUnavailable::Panicked { check: source }),
    };

    SourceReport {
        source,
        result,
        duration_ms,
    }
}
