//! Integration tests for the exptest binary
#![allow(deprecated)] // suppress assert_cmd::Command::cargo_bin deprecation in tests

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const TWO_ARM: &str = r#"{
    "analysis": "two_arm",
    "control": {"visitors": 10000, "conversions": 500},
    "variant": {"visitors": 10000, "conversions": 575}
}"#;

fn exptest() -> Command {
    Command::cargo_bin("exptest").unwrap()
}

fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_text_report_from_stdin() {
    exptest()
        .write_stdin(TWO_ARM)
        .assert()
        .success()
        .stdout(predicate::str::contains("VARIANT WINS"))
        .stdout(predicate::str::contains("Lift: +15.00%"));
}

#[test]
fn test_json_output_from_request_file() {
    let request = temp_file(TWO_ARM);
    let output = exptest()
        .arg("--request")
        .arg(request.path())
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["analysis"], "two_arm");
    assert_eq!(parsed["winner"], "variant");
    assert_eq!(parsed["is_significant"], true);
}

#[test]
fn test_flat_arm_fields_from_stdin() {
    exptest()
        .write_stdin(
            r#"{"analysis": "two_arm",
                "control_visitors": 10000, "control_conversions": 500,
                "variant_visitors": 10000, "variant_conversions": 575,
                "confidence": 95}"#,
        )
        .assert()
        .success()
        .stdout(predicate::str::contains("Lift: +15.00%"));
}

#[test]
fn test_pretty_json_spans_lines() {
    exptest()
        .args(["--format", "json", "--pretty"])
        .write_stdin(TWO_ARM)
        .assert()
        .success()
        .stdout(predicate::str::contains("\n  \"analysis\": \"two_arm\""));
}

#[test]
fn test_validation_error_exit_code() {
    exptest()
        .args(["--format", "json"])
        .write_stdin(
            r#"{"analysis": "two_arm",
                "control": {"visitors": 100, "conversions": 101},
                "variant": {"visitors": 100, "conversions": 5}}"#,
        )
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\"kind\":\"validation_error\""))
        .stdout(predicate::str::contains("control.conversions"));
}

#[test]
fn test_unsupported_correction_exit_code() {
    exptest()
        .args(["--format", "json"])
        .write_stdin(
            r#"{"analysis": "k_arm", "correction": "sidak",
                "variants": [
                    {"name": "a", "visitors": 1000, "conversions": 50},
                    {"name": "b", "visitors": 1000, "conversions": 60}
                ]}"#,
        )
        .assert()
        .code(3)
        .stdout(predicate::str::contains("unsupported_configuration"));
}

#[test]
fn test_malformed_request_exit_code() {
    exptest()
        .write_stdin("{not json")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("malformed_request"));
}

#[test]
fn test_missing_request_file_fails() {
    exptest()
        .args(["--request", "/nonexistent/request.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read request file"));
}

#[test]
fn test_seed_override_is_reported() {
    let bayesian = r#"{"analysis": "bayesian",
        "control": {"visitors": 1000, "conversions": 50},
        "variant": {"visitors": 1000, "conversions": 65},
        "draws": 2000}"#;
    let output = exptest()
        .args(["--format", "json", "--seed", "1234"])
        .write_stdin(bayesian)
        .output()
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["seed"], 1234);
    assert_eq!(parsed["draws"], 2000);
}

#[test]
fn test_bayesian_output_is_reproducible() {
    let bayesian = r#"{"analysis": "bayesian", "seed": 9,
        "control": {"visitors": 1000, "conversions": 50},
        "variant": {"visitors": 1000, "conversions": 60},
        "draws": 5000}"#;
    let run = || {
        exptest()
            .args(["--format", "json"])
            .write_stdin(bayesian)
            .output()
            .unwrap()
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn test_print_config_round_trips() {
    let output = exptest()
        .args(["--print-config", "--preset", "strict"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(text.contains("novelty_tolerance_points"));

    let config = temp_file(&text);
    let reloaded = exptest()
        .arg("--config")
        .arg(config.path())
        .arg("--print-config")
        .output()
        .unwrap();
    assert!(reloaded.status.success());
    assert_eq!(String::from_utf8(reloaded.stdout).unwrap(), text);
}

#[test]
fn test_config_file_changes_health_thresholds() {
    let config = temp_file("min_visitors_per_arm = 100000\n");
    exptest()
        .arg("--config")
        .arg(config.path())
        .write_stdin(
            r#"{"analysis": "health",
                "control": {"visitors": 5000, "conversions": 250},
                "variant": {"visitors": 5000, "conversions": 260}}"#,
        )
        .assert()
        .success()
        .stdout(predicate::str::contains("HEALTH SCORE 60/100"));
}

#[test]
fn test_invalid_config_file_fails() {
    let config = temp_file("simulation_draws = 0\n");
    exptest()
        .arg("--config")
        .arg(config.path())
        .arg("--print-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid engine configuration"));
}
