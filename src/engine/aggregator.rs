//! Finding aggregation.
//!
//! Folds the five findings of one run into an immutable `SeverityProfile`.
//! Aggregation is a pure function over an already-complete finding set.

use crate::engine::finding::{Finding, Severity, Source, Status};
use crate::DischargeError;
use serde::Serialize;
use std::collections::BTreeSet;

/// Issue counts per severity bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub critical: u32,
}

impl SeverityCounts {
    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::None => {}
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
            Severity::Critical => self.critical += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> u32 {
        match severity {
            Severity::None => 0,
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }

    pub fn total(&self) -> u32 {
        self.low + self.medium + self.high + self.critical
    }
}

/// Aggregated severity summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeverityProfile {
    counts: SeverityCounts,
    max_severity: Severity,
    blocked: BTreeSet<Source>,
    granted: BTreeSet<Source>,
}

impl SeverityProfile {
    pub fn counts(&self) -> &SeverityCounts {
        &self.counts
    }

    /// Worst effective severity across all findings
    pub fn max_severity(&self) -> Severity {
        self.max_severity
    }

    /// Sources whose finding is BLOCKED or ERROR
    pub fn blocked_sources(&self) -> &BTreeSet<Source> {
        &self.blocked
    }

    /// Sources whose finding is GRANTED
    pub fn granted_sources(&self) -> &BTreeSet<Source> {
        &self.granted
    }

    pub fn all_granted(&self) -> bool {
        self.blocked.is_empty() && self.granted.len() == Source::ALL.len()
    }
}

/// Verify the finding set holds exactly one valid finding per known source.
pub fn validate_findings(findings: &[Finding]) -> Result<(), DischargeError> {
    let mut seen = BTreeSet::new();

    for finding in findings {
        if !seen.insert(finding.source) {
            return Err(DischargeError::contract(format!(
                "duplicate finding for source '{}'",
                finding.source
            )));
        }
        finding.validate().map_err(DischargeError::contract)?;
    }

    let missing: Vec<&str> = Source::ALL
        .iter()
        .filter(|s| !seen.contains(s))
        .map(|s| s.as_str())
        .collect();

    if !missing.is_empty() {
        return Err(DischargeError::contract(format!(
            "missing finding for source(s): {}",
            missing.join(", ")
        )));
    }

    Ok(())
}

/// Merge a complete finding set into a severity profile.
///
/// ERROR findings fold in as CRITICAL regardless of their reported severity,
/// and so do their issues.
///
/// # Errors
///
/// Returns `DischargeError::ContractViolation` if the set does not contain
/// exactly one valid finding per source. Missing sources must already have
/// been substituted by the caller.
pub fn aggregate(findings: &[Finding]) -> Result<SeverityProfile, DischargeError> {
    validate_findings(findings)?;

    let mut counts = SeverityCounts::default();
    let mut max_severity = Severity::None;
    let mut blocked = BTreeSet::new();
    let mut granted = BTreeSet::new();

    for finding in findings {
        match finding.status {
            Status::Granted => {
                granted.insert(finding.source);
            }
            Status::Blocked | Status::Error => {
                blocked.insert(finding.source);
            }
        }

        for issue in &finding.issues {
            counts.record(finding.issue_severity(issue));
        }

        max_severity = max_severity.max(finding.effective_severity());
    }

    Ok(SeverityProfile {
        counts,
        max_severity,
        blocked,
        granted,
    })
}
