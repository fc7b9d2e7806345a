//! Integration tests for sdrflow-cli.
//!
//! Tests invoke the built `sdrflow` binary for each subcommand.

use std::process::Command;

use tempfile::TempDir;

/// Helper to get the path to the `sdrflow` binary built by cargo.
fn sdrflow_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sdrflow"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

// ---------------------------------------------------------------------------
// `sdrflow schema`
// ---------------------------------------------------------------------------

#[test]
fn cli_schema_lists_radio_controls() {
    let output = sdrflow_bin()
        .arg("schema")
        .output()
        .expect("failed to run sdrflow schema");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["freq", "modem", "bw", "mono", "program", "lna_state", "mode"] {
        assert!(stdout.contains(name), "schema should list '{name}'");
    }
    assert!(stdout.contains("double"));
}

#[test]
fn cli_schema_reads_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flow.toml");
    std::fs::write(
        &path,
        "[controls.squelch]\nkind = \"double\"\nmin = -120.0\nmax = 0.0\n",
    )
    .unwrap();

    let output = sdrflow_bin()
        .args(["schema", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("squelch"));
    assert!(stdout.contains("[-120, 0]"), "{stdout}");
    assert!(!stdout.contains("modem"));
}

// ---------------------------------------------------------------------------
// `sdrflow parse`
// ---------------------------------------------------------------------------

#[test]
fn cli_parse_prints_json_updates() {
    let output = sdrflow_bin()
        .args(["parse", "freq=103500000&mono=1&program=2", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(value["freq"], serde_json::json!(103_500_000.0));
    assert_eq!(value["mono"], serde_json::json!(true));
    assert_eq!(value["program"], serde_json::json!(2));
}

#[test]
fn cli_parse_rejects_unknown_parameter() {
    let output = sdrflow_bin()
        .args(["parse", "freq=1&volume=3"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown parameter volume"), "{stderr}");
}

#[test]
fn cli_parse_rejects_bad_bool() {
    let output = sdrflow_bin().args(["parse", "mono=yes"]).output().unwrap();
    assert!(!output.status.success());
}

// ---------------------------------------------------------------------------
// `sdrflow run`
// ---------------------------------------------------------------------------

#[test]
fn cli_run_meters_blocks_for_duration() {
    let output = sdrflow_bin()
        .args([
            "run",
            "--duration",
            "0.5",
            "--block-size",
            "480",
            "--set",
            "gain=2",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(value["blocks"].as_u64().unwrap() > 0);
    let rms = value["rms"].as_f64().unwrap();
    assert!(rms > 0.0 && rms < 1.0, "rms {rms}");
}

#[test]
fn cli_run_rejects_unknown_set() {
    let output = sdrflow_bin()
        .args(["run", "--duration", "0.1", "--set", "volume=1"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn cli_run_rejects_zero_capacity_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flow.toml");
    std::fs::write(&path, "[engine]\nqueue_capacity = 0\n").unwrap();

    let output = sdrflow_bin()
        .args(["run", "--duration", "0.1", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("queue_capacity"), "{stderr}");
}
