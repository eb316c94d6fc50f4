//! discharge-preflight CLI entry point
//!
//! Runs the five discharge checks for one patient and prints the decision,
//! or serves the same verification over HTTP.
//!
//! Exit codes:
//! - 0: APPROVE
//! - 1: HOLD
//! - 2: PENDING_AUTO_RESOLUTION
//! - 3: runtime error (configuration, cancellation, bad patient id)
//! - 4: contract violation (a check produced a malformed finding set)
//!
//! `serve` exits 3 if it cannot bind or the server fails.

use clap::Parser;
use discharge_preflight::checks::create_all_checks;
use discharge_preflight::cli::args::{Args, Command, RunArgs};
use discharge_preflight::cli::output::{exit_code, get_formatter};
use discharge_preflight::data::RecordStore;
use discharge_preflight::persist::DecisionRecord;
use discharge_preflight::service;
use discharge_preflight::version::BuildInfo;
use discharge_preflight::{run_discharge, CancelFlag, DischargeConfig, DischargeError};

use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

const EXIT_RUNTIME_ERROR: u8 = 3;
const EXIT_CONTRACT_VIOLATION: u8 = 4;

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    match &args.command {
        Command::Version => {
            println!("{}", BuildInfo::current());
            ExitCode::SUCCESS
        }
        Command::List => {
            print_check_list(&config);
            ExitCode::SUCCESS
        }
        Command::Run(run) => run_checks(config, run),
        Command::Serve(_) => serve(config),
    }
}

/// Diagnostics go to stderr so stdout stays machine-readable.
fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(args: &Args) -> Result<DischargeConfig, DischargeError> {
    let mut config = match &args.config {
        Some(path) => DischargeConfig::from_file(path)?,
        None => DischargeConfig::default(),
    };
    match &args.command {
        Command::Run(run) => run.apply(&mut config),
        Command::Serve(serve) => serve.apply(&mut config),
        Command::List | Command::Version => {}
    }
    Ok(config)
}

fn print_check_list(config: &DischargeConfig) {
    let store = Arc::new(RecordStore::new(&config.data_dir));
    println!("Discharge checks:");
    println!();
    for check in create_all_checks(store) {
        println!(
            "  {:<10} {:<15} {}",
            check.source().as_str(),
            check.source().display_name(),
            check.description()
        );
    }
}

fn run_checks(config: DischargeConfig, run: &RunArgs) -> ExitCode {
    let result = run_discharge(&config, &run.patient_id, &CancelFlag::new());

    let detailed = match result {
        Ok(detailed) => detailed,
        Err(e) => {
            error!(patient_id = %run.patient_id, error = %e, "discharge run failed");
            eprintln!("Error: {}", e);
            return if e.is_contract_violation() {
                ExitCode::from(EXIT_CONTRACT_VIOLATION)
            } else {
                ExitCode::from(EXIT_RUNTIME_ERROR)
            };
        }
    };

    let no_color = run.no_color || std::env::var_os("NO_COLOR").is_some();
    let formatter = get_formatter(run.format, no_color, run.verbose, run.quiet);
    let record = DecisionRecord::from_run(&detailed);
    println!("{}", formatter.format(&record));

    ExitCode::from(exit_code(record.outcome))
}

fn serve(config: DischargeConfig) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    match runtime.block_on(service::serve(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "discharge service stopped");
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}
