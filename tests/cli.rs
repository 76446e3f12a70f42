//! Black-box tests of the `igraph` binary.
//!
//! The store URL points at a closed port, so these exercise config loading,
//! argument parsing and the degrade-to-empty path of the read commands.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

fn setup_config() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("igraph.toml");
    fs::write(
        &config_path,
        r#"[fleet]
base_url = "http://127.0.0.1:9"
timeout_secs = 2

[store]
url = "http://127.0.0.1:9"
collection_prefix = "clitest"
timeout_secs = 2

[graph]
clear_delay_secs = 0
"#,
    )
    .unwrap();
    (tmp, config_path)
}

fn igraph(config: &PathBuf, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_igraph"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run igraph")
}

#[test]
fn test_stats_with_unreachable_store_reports_zero() {
    let (_tmp, config) = setup_config();
    let out = igraph(&config, &["stats"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("clitest_infrastructure"));
    assert!(stdout.contains("Nodes:       0"));
}

#[test]
fn test_search_with_unreachable_store_is_empty_json() {
    let (_tmp, config) = setup_config();
    let out = igraph(&config, &["search", "postgres", "--type", "service"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v, serde_json::json!([]));
}

#[test]
fn test_server_with_unreachable_store_is_neutral() {
    let (_tmp, config) = setup_config();
    let out = igraph(&config, &["server", "abc"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(v["server"].is_null());
    assert_eq!(v["services"], serde_json::json!([]));
}

#[test]
fn test_unknown_type_is_rejected() {
    let (_tmp, config) = setup_config();
    let out = igraph(&config, &["list", "cluster"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Unknown node type"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let out = igraph(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Failed to read config file"));
}

#[test]
fn test_map_with_unreachable_store_fails() {
    let (_tmp, config) = setup_config();
    let out = igraph(&config, &["map"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("collections"));
}

#[test]
fn test_clear_goes_straight_to_the_store() {
    let (tmp, _) = setup_config();
    let config = tmp.path().join("clear.toml");
    fs::write(
        &config,
        r#"[fleet]
base_url = "http://127.0.0.1:9"
token_env = "IGRAPH_CLI_TEST_SURELY_UNSET_TOKEN"

[store]
url = "http://127.0.0.1:9"
collection_prefix = "clitest"
timeout_secs = 2

[graph]
clear_delay_secs = 0
"#,
    )
    .unwrap();
    let out = igraph(&config, &["clear"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Failed to clear infrastructure collection"), "{}", stderr);
    assert!(!stderr.contains("token_env"), "{}", stderr);
}
