//! CLI subprocess integration tests.
//!
//! These tests invoke the `cilium` binary against a file store and verify
//! exit codes and JSON output.

use std::path::Path;
use std::process::Command;

fn cilium_bin(store: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cilium"));
    cmd.arg("--store")
        .arg(format!("file:{}", store.join("state.json").display()));
    cmd
}

const PROFILE: &str = r#"policy-source:
  - owner: root
    policies:
      - name: web-dns
        coverage:
          labels:
            app: web
        docker-config:
          host-config:
            Dns: ["1.2.3.4"]
        intent-config:
          config:
            max-scale: 3
"#;

fn write_profile(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("profile.yml");
    std::fs::write(&path, PROFILE).unwrap();
    path
}

#[test]
fn cli_version_exits_zero() {
    let store = tempfile::tempdir().unwrap();
    let output = cilium_bin(store.path()).arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("cilium"));
}

#[test]
fn cli_unknown_command_is_usage_error() {
    let store = tempfile::tempdir().unwrap();
    let output = cilium_bin(store.path()).arg("frobnicate").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_load_then_resolve() {
    let store = tempfile::tempdir().unwrap();
    let profiles = tempfile::tempdir().unwrap();
    let profile = write_profile(profiles.path());

    let output = cilium_bin(store.path()).arg("load").arg(&profile).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let output = cilium_bin(store.path())
        .args(["resolve", "--label", "app=web"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["docker-config"]["host-config"]["Dns"][0], "1.2.3.4");
    assert_eq!(json["intent-config"]["config"]["max-scale"], 3);

    let output = cilium_bin(store.path())
        .args(["resolve", "--label", "app=db"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(json["docker-config"]["host-config"].is_null());
}

#[test]
fn cli_user_policies_lists_covering_sources() {
    let store = tempfile::tempdir().unwrap();
    let profiles = tempfile::tempdir().unwrap();
    let profile = write_profile(profiles.path());
    assert!(cilium_bin(store.path()).arg("load").arg(&profile).status().unwrap().success());

    let output = cilium_bin(store.path())
        .args(["resolve", "--label", "app=web", "--user-policies"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["owner"], "root");
    assert_eq!(json[0]["policies"][0]["name"], "web-dns");
}

#[test]
fn cli_flush_drops_policies() {
    let store = tempfile::tempdir().unwrap();
    let profiles = tempfile::tempdir().unwrap();
    let profile = write_profile(profiles.path());
    assert!(cilium_bin(store.path()).arg("load").arg(&profile).status().unwrap().success());
    assert!(cilium_bin(store.path()).arg("flush").status().unwrap().success());

    let output = cilium_bin(store.path())
        .args(["resolve", "--label", "app=web", "--user-policies"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json, serde_json::json!([]));
}

#[test]
fn cli_reset_succeeds() {
    let store = tempfile::tempdir().unwrap();
    assert!(cilium_bin(store.path()).arg("reset").status().unwrap().success());
}

#[test]
fn cli_bad_label_and_missing_file() {
    let store = tempfile::tempdir().unwrap();
    let output = cilium_bin(store.path())
        .args(["resolve", "--label", "app"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid label"));

    let output = cilium_bin(store.path())
        .args(["resolve", "--label", "=web"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));

    let output = cilium_bin(store.path())
        .args(["load", "/nonexistent/profile.yml"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn cli_completions_bash() {
    let store = tempfile::tempdir().unwrap();
    let output = cilium_bin(store.path()).args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("cilium"));
}

#[test]
fn cli_man_pages_written() {
    let store = tempfile::tempdir().unwrap();
    let man = tempfile::tempdir().unwrap();
    let output = cilium_bin(store.path())
        .arg("man-pages")
        .arg(man.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(man.path().join("cilium.1").exists());
    assert!(man.path().join("cilium-resolve.1").exists());
}
