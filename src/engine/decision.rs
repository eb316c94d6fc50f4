//! Decision engine.
//!
//! Applies a priority cascade over the severity profile (first matching rule
//! wins):
//! 1. every finding GRANTED: APPROVE
//! 2. worst severity HIGH or CRITICAL: HOLD
//! 3. otherwise PENDING_AUTO_RESOLUTION when every outstanding issue is
//!    auto-resolvable, HOLD when any is not
//!
//! `decide` is a pure function: identical inputs give a field-for-field
//! identical `Decision`, whatever order the findings arrive in.

use crate::engine::aggregator::{aggregate, SeverityProfile};
use crate::engine::finding::{Finding, Issue, Severity, Source};
use crate::DischargeError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Final discharge outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Approve,
    Hold,
    PendingAutoResolution,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Approve => "APPROVE",
            Outcome::Hold => "HOLD",
            Outcome::PendingAutoResolution => "PENDING_AUTO_RESOLUTION",
        }
    }

    pub fn is_approved(&self) -> bool {
        *self == Outcome::Approve
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One actionable issue on the remediation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationItem {
    pub source: Source,
    pub code: String,
    pub title: String,
    pub description: String,
    /// Effective severity (CRITICAL for issues of an ERROR finding)
    pub severity: Severity,
    pub suggested_action: String,
    pub auto_resolvable: bool,
}

impl RemediationItem {
    fn from_issue(source: Source, severity: Severity, issue: &Issue) -> Self {
        RemediationItem {
            source,
            code: issue.code.clone(),
            title: issue.title.clone(),
            description: issue.description.clone(),
            severity,
            suggested_action: issue.suggested_action.clone(),
            auto_resolvable: issue.auto_resolvable,
        }
    }
}

/// Terminal output of the decision engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub outcome: Outcome,
    /// One justification per contributing finding
    pub reasons: Vec<String>,
    /// Severity descending, then source name, deduplicated by code
    pub remediation_items: Vec<RemediationItem>,
}

/// Derive the discharge decision.
///
/// # Errors
///
/// Returns `DischargeError::ContractViolation` if `findings` does not hold
/// exactly one valid finding per source, or if `profile` was not built from
/// `findings`.
pub fn decide(profile: &SeverityProfile, findings: &[Finding]) -> Result<Decision, DischargeError> {
    let derived = aggregate(findings)?;
    if derived != *profile {
        return Err(DischargeError::contract(
            "severity profile does not match the finding set",
        ));
    }

    let mut ordered: Vec<&Finding> = findings.iter().collect();
    ordered.sort_by_key(|f| f.source);

    // Rule 1
    if ordered.iter().all(|f| f.is_granted()) {
        let reasons = ordered
            .iter()
            .map(|f| format!("{}: clearance granted, no objection", f.source.display_name()))
            .collect();
        return Ok(Decision {
            outcome: Outcome::Approve,
            reasons,
            remediation_items: Vec::new(),
        });
    }

    // Rule 2
    if profile.max_severity().is_blocking() {
        return Ok(Decision {
            outcome: Outcome::Hold,
            reasons: outstanding_reasons(&ordered),
            remediation_items: remediation_items(&ordered, Severity::is_blocking),
        });
    }

    // Rule 3
    let outstanding: Vec<&Finding> = ordered.iter().copied().filter(|f| !f.is_granted()).collect();
    let all_auto = outstanding
        .iter()
        .all(|f| f.auto_resolvable && f.issues.iter().all(|i| i.auto_resolvable));

    let outcome = if all_auto {
        Outcome::PendingAutoResolution
    } else {
        Outcome::Hold
    };

    Ok(Decision {
        outcome,
        reasons: outstanding_reasons(&ordered),
        remediation_items: remediation_items(&ordered, |_| true),
    })
}

/// One line per BLOCKED/ERROR finding, naming its top issue.
fn outstanding_reasons(ordered: &[&Finding]) -> Vec<String> {
    ordered
        .iter()
        .filter(|f| !f.is_granted())
        .map(|f| {
            let detail = match f.top_issue() {
                Some(issue) => issue.description.as_str(),
                None => "no issue details reported",
            };
            format!(
                "{}: {} ({}) - {}",
                f.source.display_name(),
                f.status,
                f.effective_severity(),
                detail
            )
        })
        .collect()
}

fn remediation_items(ordered: &[&Finding], include: impl Fn(&Severity) -> bool) -> Vec<RemediationItem> {
    let mut items: Vec<RemediationItem> = ordered
        .iter()
        .filter(|f| !f.is_granted())
        .flat_map(|f| {
            f.issues
                .iter()
                .map(move |issue| RemediationItem::from_issue(f.source, f.issue_severity(issue), issue))
        })
        .filter(|item| include(&item.severity))
        .collect();

    // Stable: issues of one source keep their reported order
    items.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.source.as_str().cmp(b.source.as_str()))
    });

    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.code.clone()));
    items
}
