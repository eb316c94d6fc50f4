//! Finding data model.
//!
//! A `Finding` is the normalized output of one check. Findings are built once
//! per check invocation and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of one of the five discharge checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Insurance,
    Pharmacy,
    Ambulance,
    Bed,
    Lab,
}

impl Source {
    /// Every known source, in canonical order.
    pub const ALL: [Source; 5] = [
        Source::Insurance,
        Source::Pharmacy,
        Source::Ambulance,
        Source::Bed,
        Source::Lab,
    ];

    /// Stable lowercase identifier, also used as the sort key for
    /// remediation items.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Insurance => "insurance",
            Source::Pharmacy => "pharmacy",
            Source::Ambulance => "ambulance",
            Source::Bed => "bed",
            Source::Lab => "lab",
        }
    }

    /// Human-readable department name
    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Insurance => "Insurance",
            Source::Pharmacy => "Pharmacy",
            Source::Ambulance => "Ambulance",
            Source::Bed => "Bed Management",
            Source::Lab => "Lab",
        }
    }

    /// Prefix used for issue codes raised on behalf of this source.
    pub fn code_prefix(&self) -> &'static str {
        match self {
            Source::Insurance => "INS",
            Source::Pharmacy => "PHARM",
            Source::Ambulance => "TRANSPORT",
            Source::Bed => "BED",
            Source::Lab => "LAB",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insurance" => Ok(Source::Insurance),
            "pharmacy" => Ok(Source::Pharmacy),
            "ambulance" | "transport" => Ok(Source::Ambulance),
            "bed" | "bed_management" => Ok(Source::Bed),
            "lab" => Ok(Source::Lab),
            _ => Err(format!(
                "Unknown source: '{}'. Valid sources: insurance, pharmacy, ambulance, bed, lab",
                s
            )),
        }
    }
}

/// Whether a check clears the patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// No objection (NOC granted)
    Granted,
    /// The check ran and found blocking or outstanding issues
    Blocked,
    /// The check itself could not complete
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Granted => "GRANTED",
            Status::Blocked => "BLOCKED",
            Status::Error => "ERROR",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal risk classification. Declaration order is the total order
/// NONE < LOW < MEDIUM < HIGH < CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "NONE",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// HIGH and CRITICAL hold discharge unconditionally.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issue raised by a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Unique issue code (e.g. "INS_PREAUTH_MISSING"), the dedup key for
    /// remediation
    pub code: String,
    /// Short title
    #[serde(default)]
    pub title: String,
    /// Human-readable explanation
    pub description: String,
    pub severity: Severity,
    /// What staff (or automation) should do
    #[serde(default)]
    pub suggested_action: String,
    /// Can be cleared without human intervention
    #[serde(default)]
    pub auto_resolvable: bool,
    /// References to the data that supports the issue
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
}

impl Issue {
    pub fn new(code: impl Into<String>, severity: Severity, description: impl Into<String>) -> Self {
        Issue {
            code: code.into(),
            title: String::new(),
            description: description.into(),
            severity,
            suggested_action: String::new(),
            auto_resolvable: false,
            evidence: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.suggested_action = action.into();
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence.push(evidence.into());
        self
    }

    pub fn auto_resolvable(mut self) -> Self {
        self.auto_resolvable = true;
        self
    }
}

/// Normalized output of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub source: Source,
    pub status: Status,
    /// Meaningful only when `status != Granted`
    pub severity: Severity,
    pub issues: Vec<Issue>,
    /// True only if every issue is auto-resolvable
    pub auto_resolvable: bool,
    /// Wall time of the producing check, informational only
    #[serde(default)]
    pub duration_ms: u64,
}

impl Finding {
    /// A clearance: no issues, severity NONE.
    pub fn granted(source: Source) -> Self {
        Finding {
            source,
            status: Status::Granted,
            severity: Severity::None,
            issues: Vec::new(),
            auto_resolvable: true,
            duration_ms: 0,
        }
    }

    /// A blocking finding whose severity and auto-resolvability are derived
    /// from its issues.
    pub fn blocked(source: Source, issues: Vec<Issue>) -> Self {
        let severity = issues
            .iter()
            .map(|i| i.severity)
            .max()
            .unwrap_or(Severity::Low);
        let auto_resolvable = issues.iter().all(|i| i.auto_resolvable);
        Finding {
            source,
            status: Status::Blocked,
            severity,
            issues,
            auto_resolvable,
            duration_ms: 0,
        }
    }

    /// GRANTED when `issues` is empty, BLOCKED otherwise.
    pub fn from_issues(source: Source, issues: Vec<Issue>) -> Self {
        if issues.is_empty() {
            Finding::granted(source)
        } else {
            Finding::blocked(source, issues)
        }
    }

    /// Stand-in for a check that never reported or could not complete.
    /// Always ERROR/CRITICAL and never auto-resolvable.
    pub fn unavailable(source: Source, reason: &str) -> Self {
        let issue = Issue::new(
            format!("{}_CHECK_UNAVAILABLE", source.code_prefix()),
            Severity::Critical,
            format!("{} check did not complete: {}", source.display_name(), reason),
        )
        .with_title(format!("{} Check Unavailable", source.display_name()))
        .with_action(format!(
            "Verify {} clearance manually before discharge",
            source.display_name().to_lowercase()
        ));

        Finding {
            source,
            status: Status::Error,
            severity: Severity::Critical,
            issues: vec![issue],
            auto_resolvable: false,
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn is_granted(&self) -> bool {
        self.status == Status::Granted
    }

    /// Severity this finding contributes to the profile. An ERROR finding
    /// cannot certify anything and always counts as CRITICAL.
    pub fn effective_severity(&self) -> Severity {
        match self.status {
            Status::Error => Severity::Critical,
            Status::Granted => Severity::None,
            Status::Blocked => self
                .issues
                .iter()
                .map(|i| i.severity)
                .max()
                .map_or(self.severity, |worst| worst.max(self.severity)),
        }
    }

    /// Severity of `issue` as seen by the decision engine.
    pub fn issue_severity(&self, issue: &Issue) -> Severity {
        if self.status == Status::Error {
            Severity::Critical
        } else {
            issue.severity
        }
    }

    /// Worst issue, first one wins on ties.
    pub fn top_issue(&self) -> Option<&Issue> {
        let mut top: Option<&Issue> = None;
        for issue in &self.issues {
            match top {
                Some(current) if current.severity >= issue.severity => {}
                _ => top = Some(issue),
            }
        }
        top
    }

    /// Check the data-model invariants. Returns a description of the first
    /// violation found.
    pub fn validate(&self) -> Result<(), String> {
        match self.status {
            Status::Granted => {
                if !self.issues.is_empty() {
                    return Err(format!(
                        "{} finding is GRANTED but carries {} issue(s)",
                        self.source,
                        self.issues.len()
                    ));
                }
                if self.severity != Severity::None {
                    return Err(format!(
                        "{} finding is GRANTED with severity {}",
                        self.source, self.severity
                    ));
                }
            }
            Status::Blocked => {
                if self.severity == Severity::None && self.issues.is_empty() {
                    return Err(format!(
                        "{} finding is BLOCKED without severity or issues",
                        self.source
                    ));
                }
            }
            Status::Error => {}
        }

        if self.auto_resolvable && self.issues.iter().any(|i| !i.auto_resolvable) {
            return Err(format!(
                "{} finding claims auto_resolvable but has an issue that is not",
                self.source
            ));
        }

        if let Some(issue) = self.issues.iter().find(|i| i.severity == Severity::None) {
            return Err(format!(
                "{} issue {} has severity NONE",
                self.source, issue.code
            ));
        }

        Ok(())
    }
}
