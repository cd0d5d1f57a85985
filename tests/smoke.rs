//! Smoke tests -- verify the binary runs and key subcommands work.

use assert_cmd::Command;
use std::io::Write;

fn fleetpulse() -> Command {
    let mut cmd = Command::cargo_bin("fleetpulse").unwrap();
    cmd.env_remove("FLEETPULSE_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    fleetpulse()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("Fleet telemetry monitoring"));
}

#[test]
fn test_cli_version() {
    fleetpulse()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("fleetpulse"));
}

#[test]
fn test_serve_subcommand_exists() {
    fleetpulse().args(["serve", "--help"]).assert().success();
}

#[test]
fn test_rules_lists_defaults() {
    fleetpulse()
        .arg("rules")
        .assert()
        .success()
        .stdout(predicates::str::contains("R-001"))
        .stdout(predicates::str::contains("Engine Overheating"))
        .stdout(predicates::str::contains("engineTemp > 95"));
}

#[test]
fn test_rules_rejects_bad_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[[rules]]
id = "R-900"
name = "Oil Pressure"
metric = "oilPressure"
comparator = "<"
threshold = 10.0
severity = "high"
"#
    )
    .unwrap();

    fleetpulse()
        .arg("rules")
        .arg("--config")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicates::str::contains("oilPressure"));
}

#[test]
fn test_simulate_json() {
    let output = fleetpulse()
        .args(["simulate", "--ticks", "3", "--seed", "11", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["ticks"], 3);
    assert_eq!(report["edgeStatus"].as_array().unwrap().len(), 5);
    let v3 = report["edgeStatus"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["vehicleId"] == "V-003")
        .unwrap();
    assert_eq!(v3["connected"], false);
}
