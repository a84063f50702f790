//! Smoke tests -- verify the binary runs and key subcommands exist.

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("modelsweep")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("Parameter-sweep test campaigns"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("modelsweep")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("modelsweep"));
}

#[test]
fn test_serve_subcommand_exists() {
    Command::cargo_bin("modelsweep")
        .unwrap()
        .arg("serve")
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn test_start_subcommand_exists() {
    Command::cargo_bin("modelsweep")
        .unwrap()
        .args(["start", "--help"])
        .assert()
        .success();
}

#[test]
fn test_analyze_subcommand_exists() {
    Command::cargo_bin("modelsweep")
        .unwrap()
        .args(["analyze", "--help"])
        .assert()
        .success();
}

#[test]
fn test_status_requires_uuid() {
    Command::cargo_bin("modelsweep")
        .unwrap()
        .args(["status", "not-a-uuid"])
        .assert()
        .failure();
}
