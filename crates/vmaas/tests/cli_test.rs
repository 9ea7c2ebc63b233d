#![allow(deprecated)] // TODO: move from Command::cargo_bin to cargo_bin_cmd!

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const INSTANCE_SPEC: &str = r#"
name: web-01
cloud_id: 1
instance_code: vmware
plan_id: "407"
group_id: 2
layout_id: 1159
volumes:
  - name: root_vol
    size: 20
networks:
  - id: 9
config:
  template: ubuntu
id: 42
"#;

const NEW_INSTANCE_SPEC: &str = r#"
name: web-01
cloud_id: 1
instance_code: vmware
plan_id: 407
group_id: 2
layout_id: 1159
volumes:
  - name: root_vol
    size: 20
networks:
  - id: 9
config:
  template: ubuntu
"#;

/// Command isolated from the caller's config files and environment
fn vmaas(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("vmaas").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("xdg"))
        .env_remove("VMAAS_CONFIG_PATH")
        .env_remove("VMAAS_API_URL")
        .env_remove("VMAAS_TOKEN")
        .env_remove("VMAAS_SERVICE_INSTANCE")
        .env_remove("VMAAS_PROJECT");
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("vmaas").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("instance"))
        .stdout(predicate::str::contains("snapshot"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("vmaas").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vmaas"));
}

#[test]
fn test_invalid_action() {
    let mut cmd = Command::cargo_bin("vmaas").unwrap();
    cmd.args(["instance", "resize", "spec.yaml"])
        .assert()
        .failure();
}

#[test]
fn test_missing_settings_fail_before_any_call() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("web.yaml"), INSTANCE_SPEC).unwrap();

    vmaas(temp_dir.path())
        .args(["instance", "read", "web.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("api_url"));
}

#[test]
fn test_read_instance_records_state() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/api/instances/42")
        .match_header("authorization", "Bearer cli-token")
        .with_status(200)
        .with_body(r#"{"instance": {"id": 42, "name": "web-01", "status": "running"}}"#)
        .create();

    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("web.yaml"), INSTANCE_SPEC).unwrap();

    vmaas(temp_dir.path())
        .env("VMAAS_API_URL", server.url())
        .env("VMAAS_TOKEN", "cli-token")
        .args(["instance", "read", "web.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("42"))
        .stdout(predicate::str::contains("running"));

    mock.assert();

    let state = fs::read_to_string(temp_dir.path().join(".vmaas/state.json")).unwrap();
    assert!(state.contains("instance:web-01"));
    assert!(state.contains("running"));
    assert!(!temp_dir.path().join(".vmaas/lock.json").exists());
}

#[test]
fn test_instance_update_is_unsupported() {
    let server = mockito::Server::new();
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("web.yaml"), INSTANCE_SPEC).unwrap();

    vmaas(temp_dir.path())
        .env("VMAAS_API_URL", server.url())
        .env("VMAAS_TOKEN", "cli-token")
        .args(["instance", "update", "web.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not supported"));
}

#[test]
fn test_create_keeps_assigned_id_when_check_fails() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/api/virtual-images")
        .match_query(mockito::Matcher::UrlEncoded("name".into(), "ubuntu".into()))
        .with_status(200)
        .with_body(r#"{"virtualImages": [{"id": 55, "name": "ubuntu"}]}"#)
        .create();
    let create = server
        .mock("POST", "/api/instances")
        .with_status(200)
        .with_body(r#"{"instance": {"id": 0, "name": "web-01", "status": "provisioning"}}"#)
        .expect(1)
        .create();

    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("web.yaml"), NEW_INSTANCE_SPEC).unwrap();

    vmaas(temp_dir.path())
        .env("VMAAS_API_URL", server.url())
        .env("VMAAS_TOKEN", "cli-token")
        .args(["instance", "create", "web.yaml"])
        .assert()
        .failure();

    create.assert();
    let state = fs::read_to_string(temp_dir.path().join(".vmaas/state.json")).unwrap();
    assert!(state.contains("instance:web-01"));
    assert!(state.contains("provisioning"));

    // The recorded instance blocks a second provisioning call
    vmaas(temp_dir.path())
        .env("VMAAS_API_URL", server.url())
        .env("VMAAS_TOKEN", "cli-token")
        .args(["instance", "create", "web.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already created"));
    create.assert();
}

#[test]
fn test_verbose_logs_loaded_settings() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/api/instances/42")
        .with_status(200)
        .with_body(r#"{"instance": {"id": 42, "name": "web-01", "status": "running"}}"#)
        .create();

    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("web.yaml"), INSTANCE_SPEC).unwrap();

    vmaas(temp_dir.path())
        .env("VMAAS_API_URL", server.url())
        .env("VMAAS_TOKEN", "cli-token")
        .env_remove("RUST_LOG")
        .args(["-v", "instance", "read", "web.yaml"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Loaded settings"))
        .stderr(predicate::str::contains("state.json"));
}
