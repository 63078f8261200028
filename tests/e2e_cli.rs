//! CLI end-to-end tests
//!
//! Tests for seamcut command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the seamcut binary
#[allow(deprecated)]
fn seamcut_cmd() -> Command {
    let mut cmd = Command::cargo_bin("seamcut").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn edit_fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/edits")
        .join(name)
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = seamcut_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = seamcut_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("seamcut"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = seamcut_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "seamcut {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_cli_simulate_help() {
    let mut cmd = seamcut_cmd();
    cmd.args(["simulate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("simulated video element"));
}

#[test]
fn test_cli_map_virtual_to_real() {
    let mut cmd = seamcut_cmd();
    cmd.arg("map")
        .arg(edit_fixture("cut.json"))
        .args(["--at", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("virtual 00:03.000 -> real 00:07.000"));
}

#[test]
fn test_cli_map_real_inside_cut() {
    let mut cmd = seamcut_cmd();
    cmd.arg("map")
        .arg(edit_fixture("cut.json"))
        .args(["--at", "4", "--real"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not inside any enabled segment"))
        .stdout(predicate::str::contains("Next segment starts at virtual 00:02.000"));
}

#[test]
fn test_cli_map_json() {
    let mut cmd = seamcut_cmd();
    let output = cmd
        .arg("map")
        .arg(edit_fixture("segments.json"))
        .args(["--at", "13.5", "--real", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["is_valid"], true);
    assert_eq!(json["time"], 6.5);
}

#[test]
fn test_cli_inspect() {
    let mut cmd = seamcut_cmd();
    cmd.arg("inspect")
        .arg(edit_fixture("cut.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Duration: 00:04.000"))
        .stdout(predicate::str::contains("3 (2 enabled"))
        .stdout(predicate::str::contains("No issues found"));
}

#[test]
fn test_cli_inspect_json() {
    let mut cmd = seamcut_cmd();
    let output = cmd
        .arg("inspect")
        .arg(edit_fixture("cut.json"))
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["duration"], 4.0);
    assert_eq!(json["segments"].as_array().unwrap().len(), 3);
    assert_eq!(json["segments"][1]["enabled"], false);
}

#[test]
fn test_cli_inspect_missing_file() {
    let mut cmd = seamcut_cmd();
    cmd.args(["inspect", "/nonexistent/edit.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_inspect_invalid_edit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, r#"{"tracks": []}"#).unwrap();

    let mut cmd = seamcut_cmd();
    cmd.arg("inspect")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse edit file"));
}

#[test]
fn test_cli_simulate_plays_to_completion() {
    let mut cmd = seamcut_cmd();
    cmd.arg("simulate")
        .arg(edit_fixture("cut.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("complete"))
        .stdout(predicate::str::contains("Completed: yes"));
}

#[test]
fn test_cli_simulate_json_with_seeks() {
    let mut cmd = seamcut_cmd();
    let output = cmd
        .arg("simulate")
        .arg(edit_fixture("segments.json"))
        .args(["--seek", "0.5:8", "--seek", "0.5:2", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["completed"], true);
    let results: Vec<_> = json["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["event"] == "seek_result")
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["outcome"], "cancelled");
    assert_eq!(results[1]["outcome"], "settled");
}

#[test]
fn test_cli_simulate_rejects_bad_seek() {
    let mut cmd = seamcut_cmd();
    cmd.arg("simulate")
        .arg(edit_fixture("cut.json"))
        .args(["--seek", "later"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid time"));
}

#[test]
fn test_cli_validate_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    let config_content = r#"
[segments]
boundary_threshold_ms = 50

[player]
default_playback_rate = 1.5
"#;

    fs::write(&config_path, config_content).unwrap();

    let mut cmd = seamcut_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Boundary threshold: 50 ms"));
}

#[test]
fn test_cli_validate_rejects_inverted_rates() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        "[player]\nmin_playback_rate = 4.0\nmax_playback_rate = 2.0\n",
    )
    .unwrap();

    let mut cmd = seamcut_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("exceeds max_playback_rate"));
}
