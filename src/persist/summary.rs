//! Deterministic discharge summaries.

use crate::engine::decision::{Decision, Outcome};
use serde::{Deserialize, Serialize};

/// Issues named in a HOLD summary before the rest are elided
const SUMMARY_ISSUE_LIMIT: usize = 3;

/// Two renderings of the same decision: one for the patient, one for the
/// chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DischargeSummary {
    pub plain_text: String,
    pub for_medical_record: String,
}

impl DischargeSummary {
    pub fn from_decision(decision: &Decision) -> Self {
        match decision.outcome {
            Outcome::Approve => DischargeSummary {
                plain_text: "Patient discharge has been approved. All verification checks passed \
                             successfully. Please proceed with discharge procedures."
                    .to_string(),
                for_medical_record: "Discharge approved. All checks (Insurance, Pharmacy, \
                                     Ambulance, Bed Management, Lab) granted NOC. No blocking \
                                     issues identified."
                    .to_string(),
            },
            Outcome::Hold => {
                let named = named_issues(decision);
                let blocking = decision
                    .remediation_items
                    .iter()
                    .any(|i| i.severity.is_blocking());
                let class = if blocking {
                    "Critical/high severity issues identified"
                } else {
                    "Issues requiring staff action identified"
                };
                DischargeSummary {
                    plain_text: format!(
                        "Discharge is on hold due to pending issues: {}. Please contact hospital \
                         staff for details.",
                        named
                    ),
                    for_medical_record: format!(
                        "Discharge HOLD. {}: {}. Resolution required before discharge.",
                        class, named
                    ),
                }
            }
            Outcome::PendingAutoResolution => DischargeSummary {
                plain_text: "Discharge is pending minor issue resolution. Hospital staff is \
                             working to resolve these items."
                    .to_string(),
                for_medical_record: format!(
                    "Discharge pending auto-resolution. {} medium/low severity issue(s) \
                     identified, all resolvable without staff intervention.",
                    decision.remediation_items.len()
                ),
            },
        }
    }
}

fn named_issues(decision: &Decision) -> String {
    let mut named: Vec<String> = decision
        .remediation_items
        .iter()
        .take(SUMMARY_ISSUE_LIMIT)
        .map(|item| {
            let title = if item.title.is_empty() {
                &item.code
            } else {
                &item.title
            };
            format!("{}: {}", item.source.display_name(), title)
        })
        .collect();

    let rest = decision.remediation_items.len().saturating_sub(SUMMARY_ISSUE_LIMIT);
    if rest > 0 {
        named.push(format!("and {} more", rest));
    }
    named.join(", ")
}
