//! CLI integration tests.
//!
//! Run the built binary against temporary record directories and check
//! exit codes and output.

use crate::mocks::{clean_record, hold_record, pending_record, RecordFixture};
use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("discharge-preflight").unwrap();
    cmd.env_remove("DISCHARGE_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn run(fixture: &RecordFixture, patient_id: &str) -> Command {
    let mut cmd = cli();
    cmd.arg("run")
        .arg(patient_id)
        .arg("--data-dir")
        .arg(fixture.data_dir())
        .arg("--output-dir")
        .arg(fixture.output_dir())
        .arg("--escalations-dir")
        .arg(fixture.escalations_dir())
        .arg("--no-color");
    cmd
}

#[test]
fn test_version_command() {
    cli()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("discharge-preflight "));
}

#[test]
fn test_list_command() {
    cli()
        .arg("list")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("insurance")
                .and(predicate::str::contains("pharmacy"))
                .and(predicate::str::contains("ambulance"))
                .and(predicate::str::contains("Bed Management"))
                .and(predicate::str::contains("lab")),
        );
}

#[test]
fn test_approve_exits_zero() {
    let fixture = RecordFixture::new();
    fixture.write(&clean_record("P1"));

    run(&fixture, "P1")
        .arg("--no-persist")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("DECISION: [APPROVE] (exit code 0)"));
}

#[test]
fn test_hold_exits_one() {
    let fixture = RecordFixture::new();
    fixture.write(&hold_record("P2"));

    run(&fixture, "P2")
        .arg("--no-persist")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Insurance policy status: expired"))
        .stdout(predicate::str::contains("DECISION: [HOLD] (exit code 1)"));
}

#[test]
fn test_pending_exits_two() {
    let fixture = RecordFixture::new();
    fixture.write(&pending_record("P3"));

    run(&fixture, "P3")
        .arg("--no-persist")
        .assert()
        .code(2);
}

#[test]
fn test_json_format() {
    let fixture = RecordFixture::new();
    fixture.write(&hold_record("P4"));

    let output = run(&fixture, "P4")
        .args(["--no-persist", "--format", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["outcome"], "HOLD");
    assert_eq!(value["remediation_items"][0]["code"], "INS_POLICY_EXPIRED");
}

#[test]
fn test_run_persists_state() {
    let fixture = RecordFixture::new();
    fixture.write(&clean_record("P5"));

    run(&fixture, "P5").arg("--quiet").assert().code(0);

    assert!(fixture.output_dir().join("discharge_state_P5.json").exists());
    assert!(fixture.output_dir().join("discharge_audit_log_P5.json").exists());
}

#[test]
fn test_escalations_dir_flag() {
    let fixture = RecordFixture::new();
    fixture.write(&hold_record("P9"));

    run(&fixture, "P9").arg("--quiet").assert().code(1);

    let patient_dir = fixture.escalations_dir().join("patient_P9");
    assert!(patient_dir.join("insurance_desk.json").exists());
    assert!(patient_dir.join("escalation_summary_P9.json").exists());
    assert!(!fixture.output_dir().join("patient_P9").exists());
}

#[test]
fn test_sequential_flag() {
    let fixture = RecordFixture::new();
    fixture.write(&hold_record("P6"));

    run(&fixture, "P6")
        .args(["--no-persist", "--sequential", "--timeout", "2000"])
        .assert()
        .code(1);
}

#[test]
fn test_unknown_patient_holds() {
    let fixture = RecordFixture::new();
    std::fs::create_dir_all(fixture.data_dir()).unwrap();

    run(&fixture, "P404")
        .arg("--no-persist")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[ERROR]"));
}

#[test]
fn test_blank_patient_id_is_runtime_error() {
    let fixture = RecordFixture::new();

    run(&fixture, "  ")
        .arg("--no-persist")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("invalid patient id"));
}

#[test]
fn test_bad_config_file_is_runtime_error() {
    let fixture = RecordFixture::new();
    let config = fixture.root.path().join("discharge.toml");
    std::fs::write(&config, "timeout = \"soon\"").unwrap();

    cli()
        .args(["--config"])
        .arg(&config)
        .args(["run", "P1"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("failed to parse configuration"));
}

#[test]
fn test_zero_timeout_is_runtime_error() {
    let fixture = RecordFixture::new();
    fixture.write(&clean_record("P7"));

    run(&fixture, "P7")
        .args(["--no-persist", "--timeout", "0"])
        .assert()
        .code(3);
}

#[test]
fn test_config_file_applies() {
    let fixture = RecordFixture::new();
    fixture.write(&clean_record("P8"));
    let config = fixture.root.path().join("discharge.toml");
    std::fs::write(
        &config,
        format!(
            "data_dir = {:?}\npersist = false\nparallel = false\n",
            fixture.data_dir().display().to_string()
        ),
    )
    .unwrap();

    cli()
        .arg("--config")
        .arg(&config)
        .args(["run", "P8", "--no-color"])
        .assert()
        .code(0);
    assert!(!fixture.output_dir().exists());
}

#[test]
fn test_quiet_and_verbose_conflict() {
    cli()
        .args(["run", "P1", "--quiet", "--verbose"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_missing_subcommand() {
    cli().assert().failure();
}
