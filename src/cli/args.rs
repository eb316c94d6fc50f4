//! Command line arguments for discharge-preflight.

use crate::config::DischargeConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Patient discharge verification
#[derive(Parser, Debug, Clone)]
#[command(name = "discharge-preflight", disable_version_flag = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "DISCHARGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter for stderr diagnostics (e.g. "info", "discharge_preflight=debug").
    /// Falls back to RUST_LOG, then "warn".
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run all five checks for a patient and print the decision
    Run(RunArgs),
    /// Serve the verification endpoint over HTTP
    Serve(ServeArgs),
    /// List the discharge checks
    List,
    /// Print version information
    Version,
}

/// Output format selection
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

/// Options shared by `run` and `serve`: how checks execute and where
/// records and results live.
#[derive(clap::Args, Debug, Clone, Default, PartialEq)]
pub struct EngineArgs {
    /// Run checks one after another instead of in parallel
    #[arg(long)]
    pub sequential: bool,

    /// Deadline for all checks, in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Directory of patient records
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory for decision state and audit logs
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Directory for department escalation files
    #[arg(long)]
    pub escalations_dir: Option<PathBuf>,

    /// Do not write state, audit log or escalations
    #[arg(long)]
    pub no_persist: bool,
}

impl EngineArgs {
    /// Layer command line overrides on top of file configuration.
    pub fn apply(&self, config: &mut DischargeConfig) {
        if self.sequential {
            config.parallel = false;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_ms = timeout;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(dir) = &self.escalations_dir {
            config.escalations_dir = dir.clone();
        }
        if self.no_persist {
            config.persist = false;
        }
    }
}

#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Patient identifier
    pub patient_id: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Only print the outcome and remediation
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Include per-source detail and timings
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

impl RunArgs {
    pub fn apply(&self, config: &mut DischargeConfig) {
        self.engine.apply(config);
    }
}

#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    #[command(flatten)]
    pub engine: EngineArgs,
}

impl ServeArgs {
    pub fn apply(&self, config: &mut DischargeConfig) {
        self.engine.apply(config);
        if let Some(addr) = self.listen {
            config.listen = addr;
        }
    }
}
