//! Output formatting for discharge-preflight.
//!
//! Provides terminal and JSON formatters over a [`DecisionRecord`].
//!
//! # Graceful Degradation
//!
//! - Non-TTY output: color disabled via NO_COLOR or --no-color
//! - Issues without a title: the issue code is printed instead
//! - JSON serialization failure: an error object is emitted instead of
//!   partial output
//!
//! No function in this module will panic.

use crate::cli::args::OutputFormat;
use crate::engine::decision::Outcome;
use crate::engine::finding::{Severity, Status};
use crate::persist::DecisionRecord;

const RULE: &str =
    "--------------------------------------------------------------------------------";

/// Trait for output formatters
pub trait OutputFormatter {
    fn format(&self, record: &DecisionRecord) -> String;
}

/// Terminal (human-readable) formatter
pub struct TerminalFormatter {
    color: bool,
    verbose: bool,
    quiet: bool,
}

impl TerminalFormatter {
    pub fn new(color: bool, verbose: bool, quiet: bool) -> Self {
        TerminalFormatter {
            color,
            verbose,
            quiet,
        }
    }

    fn colorize(&self, text: &str, color_code: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", color_code, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.colorize(text, "32")
    }

    fn yellow(&self, text: &str) -> String {
        self.colorize(text, "33")
    }

    fn red(&self, text: &str) -> String {
        self.colorize(text, "31")
    }

    fn gray(&self, text: &str) -> String {
        self.colorize(text, "90")
    }

    fn outcome_label(&self, outcome: Outcome) -> String {
        let label = format!("[{}]", outcome);
        match outcome {
            Outcome::Approve => self.green(&label),
            Outcome::PendingAutoResolution => self.yellow(&label),
            Outcome::Hold => self.red(&label),
        }
    }

    fn status_label(&self, status: Status) -> String {
        match status {
            Status::Granted => self.green("[GRANTED]"),
            Status::Blocked => self.yellow("[BLOCKED]"),
            Status::Error => self.red("[ERROR]  "),
        }
    }

    fn severity_label(&self, severity: Severity) -> String {
        let label = format!("{:<8}", severity.as_str());
        match severity {
            Severity::Critical | Severity::High => self.red(&label),
            Severity::Medium => self.yellow(&label),
            Severity::Low | Severity::None => self.gray(&label),
        }
    }
}

impl OutputFormatter for TerminalFormatter {
    fn format(&self, record: &DecisionRecord) -> String {
        let mut output = String::new();

        if !self.quiet {
            output.push_str(RULE);
            output.push('\n');
            output.push_str("discharge-preflight decision\n");
            output.push_str(&format!("Patient: {}\n", record.patient_id));
            output.push_str(&format!(
                "Decided at: {}\n",
                record.decided_at.format("%Y-%m-%dT%H:%M:%SZ")
            ));
            output.push_str(RULE);
            output.push_str("\n\n");

            output.push_str("CHECKS\n");
            for source in &record.sources {
                let name = source.source.display_name();
                if self.verbose {
                    output.push_str(&format!(
                        "  {} {:<15} {} ({}ms)\n",
                        self.status_label(source.status),
                        name,
                        self.severity_label(source.severity),
                        source.duration_ms
                    ));
                    for issue in &source.issues {
                        let title = if issue.title.is_empty() {
                            &issue.code
                        } else {
                            &issue.title
                        };
                        output.push_str(&format!(
                            "      {} {}: {}\n",
                            self.gray(&format!("[{}]", issue.code)),
                            title,
                            issue.description
                        ));
                    }
                } else {
                    output.push_str(&format!("  {} {}\n", self.status_label(source.status), name));
                }
            }
            output.push('\n');

            output.push_str("REASONS\n");
            for reason in &record.reasons {
                output.push_str(&format!("  - {}\n", reason));
            }
            output.push('\n');
        }

        if !record.remediation_items.is_empty() {
            output.push_str("REMEDIATION\n");
            for (n, item) in record.remediation_items.iter().enumerate() {
                let auto = if item.auto_resolvable {
                    self.gray(" (auto)")
                } else {
                    String::new()
                };
                output.push_str(&format!(
                    "  {}. {} {:<15} {}{}\n",
                    n + 1,
                    self.severity_label(item.severity),
                    item.source.display_name(),
                    item.description,
                    auto
                ));
                if !item.suggested_action.is_empty() {
                    output.push_str(&format!("     -> {}\n", item.suggested_action));
                }
            }
            output.push('\n');
        }

        if !self.quiet {
            output.push_str(&format!("Summary: {}\n", record.summary.plain_text));
            if self.verbose {
                output.push_str(&format!(
                    "Medical record: {}\n",
                    record.summary.for_medical_record
                ));
            }
            output.push_str(RULE);
            output.push('\n');
            let counts = &record.severity_counts;
            output.push_str(&format!(
                "ISSUES: {} critical, {} high, {} medium, {} low\n",
                counts.critical, counts.high, counts.medium, counts.low
            ));
        }

        output.push_str(&format!(
            "DECISION: {} (exit code {})",
            self.outcome_label(record.outcome),
            exit_code(record.outcome)
        ));
        if !self.quiet {
            output.push('\n');
            output.push_str(RULE);
        }

        output
    }
}

/// JSON formatter
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        JsonFormatter { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, record: &DecisionRecord) -> String {
        let result = if self.pretty {
            serde_json::to_string_pretty(record)
        } else {
            serde_json::to_string(record)
        };
        result.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

/// Process exit code for an outcome
pub fn exit_code(outcome: Outcome) -> u8 {
    match outcome {
        Outcome::Approve => 0,
        Outcome::Hold => 1,
        Outcome::PendingAutoResolution => 2,
    }
}

/// Get the appropriate formatter for the output format
pub fn get_formatter(
    format: OutputFormat,
    no_color: bool,
    verbose: bool,
    quiet: bool,
) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(TerminalFormatter::new(!no_color, verbose, quiet)),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}
