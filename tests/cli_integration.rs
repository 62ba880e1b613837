//! CLI Integration Tests
//!
//! End-to-end tests for the relay binary using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get the relay binary for testing
fn relay_cmd() -> Command {
    let mut cmd = Command::cargo_bin("relay").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("RELAY_CONFIG")
        .env_remove("RELAY_MAX_RETRIES")
        .env_remove("RUST_LOG");
    cmd
}

/// Write a config with one generate endpoint at `url` and no backoff
fn write_config(dir: &Path, url: &str) -> PathBuf {
    let path = dir.join("relay.toml");
    let content = format!(
        r#"
[retry]
max_retries = 2
initial_backoff_seconds = 0.0
jitter = false

[logging]
level = "warn"

[[endpoints]]
id = "local"
name = "Local"
dialect = "generate"
url = "{url}"
model = "llama3"
api_key = "sk-very-secret"
"#
    );
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_version_output() {
    relay_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("relay"));
}

#[test]
fn test_help_shows_all_commands() {
    relay_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("send"))
        .stdout(predicate::str::contains("endpoints"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_send_help() {
    relay_cmd()
        .args(["send", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--endpoint"))
        .stdout(predicate::str::contains("--no-failover"))
        .stdout(predicate::str::contains("--stream"));
}

#[test]
fn test_config_init_creates_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("relay.toml");

    relay_cmd()
        .args(["config", "init", "-o", config_path.to_str().unwrap()])
        .assert()
        .success();

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[[endpoints]]"));
}

#[test]
fn test_config_init_no_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("relay.toml");
    std::fs::write(&config_path, "existing content").unwrap();

    relay_cmd()
        .args(["config", "init", "-o", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exists"));
}

#[test]
fn test_endpoints_hides_credentials() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), "http://localhost:11434");

    relay_cmd()
        .args(["endpoints", "--json", "-c", config_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"local\""))
        .stdout(predicate::str::contains("\"credential\": true"))
        .stdout(predicate::str::contains("sk-very-secret").not());
}

#[test]
fn test_missing_config_fails() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    relay_cmd()
        .args(["send", "-c", missing.to_str().unwrap(), "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_send_prints_answer() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/api/generate")
        .match_header("authorization", "Bearer sk-very-secret")
        .with_status(200)
        .with_body(r#"{"model":"llama3","response":"Hello from llama","done":true}"#)
        .create();

    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), &server.url());

    relay_cmd()
        .args(["send", "-c", config_path.to_str().unwrap(), "Say hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello from llama"));
    mock.assert();
}

#[test]
fn test_send_stream_json_output_conflict() {
    relay_cmd()
        .args(["send", "--stream", "--json", "hi"])
        .assert()
        .failure();
}

#[test]
fn test_send_stream_prints_fragments() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_body(
            "{\"response\":\"Hel\",\"done\":false}\n{\"response\":\"lo\",\"done\":false}\n{\"response\":\"\",\"done\":true}\n",
        )
        .create();

    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), &server.url());

    relay_cmd()
        .args(["send", "--stream", "-c", config_path.to_str().unwrap(), "hi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello"));
}

#[test]
fn test_send_json_with_health() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_body(r#"{"response":"4","done":true}"#)
        .create();

    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), &server.url());

    let output = relay_cmd()
        .args([
            "send",
            "--json",
            "--health",
            "-c",
            config_path.to_str().unwrap(),
            "2+2?",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["completion"]["text"], "4");
    assert_eq!(parsed["completion"]["endpoint_id"], "local");
    assert_eq!(parsed["health"][0]["state"], "healthy");
}

#[test]
fn test_send_failure_reports_error() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/api/generate")
        .with_status(503)
        .with_body("down for maintenance")
        .expect(2)
        .create();

    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), &server.url());

    relay_cmd()
        .args(["send", "-c", config_path.to_str().unwrap(), "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed after 2 attempts"));
}

#[test]
fn test_invalid_command() {
    relay_cmd()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_completions_bash() {
    relay_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complete"));
}
