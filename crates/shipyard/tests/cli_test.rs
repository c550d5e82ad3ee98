#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

const CONFIG: &str = r#"{
    "projectName": "shop",
    "domain": "shop.example",
    "databaseType": "managed",
    "credentials": { "appSecret": "app-secret-1" },
    "features": { "enableSSL": true }
}"#;

fn shipyard(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("shipyard").unwrap();
    cmd.current_dir(dir)
        .env_remove("SHIPYARD_CONFIG")
        .env_remove("DIGITALOCEAN_TOKEN")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_cli_help() {
    let dir = tempdir().unwrap();
    shipyard(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("cleanup"))
        .stdout(predicate::str::contains("plan"));
}

#[test]
fn test_cli_version() {
    let dir = tempdir().unwrap();
    shipyard(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shipyard"));
}

#[test]
fn test_deploy_help_lists_flags() {
    let dir = tempdir().unwrap();
    shipyard(dir.path())
        .args(["deploy", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--cleanup-on-error"))
        .stdout(predicate::str::contains("--app-dir"));
}

#[test]
fn test_plan_discovers_config_in_working_directory() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("shipyard.json"), CONFIG).unwrap();

    shipyard(dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("shop-app"))
        .stdout(predicate::str::contains("shop-db"))
        .stdout(predicate::str::contains("shop-cert"))
        .stdout(predicate::str::contains("shop.example"));
}

#[test]
fn test_plan_rejects_invalid_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, CONFIG.replace("\"shop\"", "\"Shop_App\"")).unwrap();

    shipyard(dir.path())
        .arg("plan")
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Shop_App"));
}

#[test]
fn test_deploy_without_config_fails() {
    let dir = tempdir().unwrap();
    shipyard(dir.path())
        .args(["deploy", "--yes", "missing.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing.json"));
}

#[test]
fn test_status_without_state() {
    let dir = tempdir().unwrap();
    shipyard(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No deployment recorded"));
}

#[test]
fn test_status_shows_failed_phase() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join(".shipyard")).unwrap();
    fs::write(
        dir.path().join(".shipyard/state.json"),
        r#"{
  "version": 1,
  "project": "shop",
  "updated_at": "2026-03-01T10:00:00Z",
  "resources": {
    "compute": {
      "id": "3164444",
      "name": "shop-app",
      "status": "active",
      "attributes": { "public_ipv4": "203.0.113.10" },
      "created_at": "2026-03-01T09:58:00Z"
    }
  },
  "steps": { "prerequisites": "completed", "compute": "completed", "database": "failed" }
}"#,
    )
    .unwrap();

    shipyard(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("203.0.113.10"))
        .stdout(predicate::str::contains("failed in phase 'database'"));
}

#[test]
fn test_cleanup_without_state_is_a_no_op() {
    let dir = tempdir().unwrap();
    shipyard(dir.path())
        .args(["cleanup", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No deployment recorded"));
}
