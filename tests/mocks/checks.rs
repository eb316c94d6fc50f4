//! Scripted checks.

use discharge_preflight::engine::runner::{CheckOrchestrator, RunnerConfig};
use discharge_preflight::{Check, CheckUnavailable, Finding, Issue, Severity, Source};
use std::sync::Arc;
use std::time::Duration;

/// Returns a fixed finding.
pub struct ScriptedCheck {
    pub source: Source,
    pub finding: Finding,
}

impl ScriptedCheck {
    pub fn new(finding: Finding) -> Arc<dyn Check> {
        Arc::new(ScriptedCheck {
            source: finding.source,
            finding,
        })
    }
}

impl Check for ScriptedCheck {
    fn source(&self) -> Source {
        self.source
    }

    fn description(&self) -> &str {
        "scripted finding"
    }

    fn run(&self, _patient_id: &str) -> Result<Finding, CheckUnavailable> {
        Ok(self.finding.clone())
    }
}

/// Always reports its department system as unreachable.
pub struct FailingCheck {
    pub source: Source,
}

impl Check for FailingCheck {
    fn source(&self) -> Source {
        self.source
    }

    fn description(&self) -> &str {
        "always fails"
    }

    fn run(&self, _patient_id: &str) -> Result<Finding, CheckUnavailable> {
        Err(CheckUnavailable::Transport {
            check: self.source,
            reason: "connection refused".to_string(),
        })
    }
}

/// Sleeps before granting.
pub struct SlowCheck {
    pub source: Source,
    pub delay: Duration,
}

impl Check for SlowCheck {
    fn source(&self) -> Source {
        self.source
    }

    fn description(&self) -> &str {
        "slow clearance"
    }

    fn run(&self, _patient_id: &str) -> Result<Finding, CheckUnavailable> {
        std::thread::sleep(self.delay);
        Ok(Finding::granted(self.source))
    }
}

pub struct PanickingCheck {
    pub source: Source,
}

impl Check for PanickingCheck {
    fn source(&self) -> Source {
        self.source
    }

    fn description(&self) -> &str {
        "panics"
    }

    fn run(&self, _patient_id: &str) -> Result<Finding, CheckUnavailable> {
        panic!("department client crashed");
    }
}

/// Registered under one source but reports a finding for another.
pub struct MislabeledCheck {
    pub registered_as: Source,
    pub reports_as: Source,
}

impl Check for MislabeledCheck {
    fn source(&self) -> Source {
        self.registered_as
    }

    fn description(&self) -> &str {
        "reports the wrong source"
    }

    fn run(&self, _patient_id: &str) -> Result<Finding, CheckUnavailable> {
        Ok(Finding::granted(self.reports_as))
    }
}

/// One granting check per source.
pub fn granting_checks() -> Vec<Arc<dyn Check>> {
    Source::ALL
        .iter()
        .map(|s| ScriptedCheck::new(Finding::granted(*s)))
        .collect()
}

/// Granting checks with `replacement` swapped in for its source.
pub fn granting_checks_except(replacement: Arc<dyn Check>) -> Vec<Arc<dyn Check>> {
    let replaced = replacement.source();
    let mut checks: Vec<Arc<dyn Check>> = Source::ALL
        .iter()
        .filter(|s| **s != replaced)
        .map(|s| ScriptedCheck::new(Finding::granted(*s)))
        .collect();
    checks.push(replacement);
    checks
}

pub fn orchestrator(checks: Vec<Arc<dyn Check>>, parallel: bool, timeout_ms: u64) -> CheckOrchestrator {
    let mut orchestrator = CheckOrchestrator::new(RunnerConfig {
        parallel,
        timeout_ms,
    });
    orchestrator.register_checks(checks);
    orchestrator
}

pub fn issue(code: &str, severity: Severity) -> Issue {
    Issue::new(code, severity, format!("{} raised", code))
        .with_title(code.replace('_', " "))
        .with_action(format!("Resolve {}", code))
}

pub fn auto_issue(code: &str, severity: Severity) -> Issue {
    issue(code, severity).auto_resolvable()
}
