//! CLI integration tests
//!
//! These run the built `svcgraph` binary. Projects are made of prebuilt
//! services only, so a dry run needs neither an LLM nor a graph database.

use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn svcgraph_bin() -> PathBuf {
    let mut path = env::current_exe()
        .expect("Failed to get current executable path")
        .parent()
        .expect("No parent")
        .to_path_buf();
    if path.ends_with("deps") {
        path = path.parent().expect("No parent").to_path_buf();
    }
    path.join("svcgraph")
}

fn svcgraph(args: &[&str]) -> Output {
    Command::new(svcgraph_bin())
        .args(args)
        .env("SVCGRAPH_EMBEDDING_BACKEND", "hashing")
        .env_remove("SVCGRAPH_NEO4J_URL")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute svcgraph")
}

fn create_prebuilt_project(dir: &TempDir) -> PathBuf {
    let root = dir.path().join("infra");
    fs::create_dir_all(&root).unwrap();
    fs::write(
        root.join("docker-compose.yml"),
        "services:\n  postgres:\n    image: postgres:16\n  redis:\n    image: redis:7\n",
    )
    .unwrap();
    root
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_cli_help() {
    let output = svcgraph(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("svcgraph"));
    assert!(stdout.contains("analyze"));
    assert!(stdout.contains("health"));
}

#[test]
fn test_cli_version() {
    let output = svcgraph(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_analyze_missing_path_fails() {
    let output = svcgraph(&["analyze", "/definitely/not/here", "--dry-run"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_analyze_without_graph_store_fails() {
    let dir = TempDir::new().unwrap();
    let root = create_prebuilt_project(&dir);
    let output = svcgraph(&["analyze", path_arg(&root)]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_analyze_dry_run_json() {
    let dir = TempDir::new().unwrap();
    let root = create_prebuilt_project(&dir);
    let graph_file = dir.path().join("graph.json");

    let output = svcgraph(&[
        "-q",
        "analyze",
        path_arg(&root),
        "--dry-run",
        "--format",
        "json",
        "--graph-output",
        path_arg(&graph_file),
    ]);
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));

    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["project"], "infra");
    assert_eq!(summary["services_found"], 2);
    assert_eq!(summary["services_analyzed"], 0);
    assert_eq!(summary["materialized"]["nodes"], 3);

    let graph: Value = serde_json::from_str(&fs::read_to_string(graph_file).unwrap()).unwrap();
    assert_eq!(graph["services"].as_array().unwrap().len(), 2);
    assert!(graph["edges"].as_array().unwrap().is_empty());
}

#[test]
fn test_analyze_empty_project_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("README.md"), "nothing\n").unwrap();
    let output = svcgraph(&["analyze", path_arg(dir.path()), "--dry-run"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_analyze_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let root = create_prebuilt_project(&dir);
    let out_file = dir.path().join("summary.yaml");

    let output = svcgraph(&[
        "-q",
        "analyze",
        path_arg(&root),
        "--dry-run",
        "--format",
        "yaml",
        "--output",
        path_arg(&out_file),
    ]);
    assert!(output.status.success());
    let content = fs::read_to_string(out_file).unwrap();
    assert!(content.contains("project: infra"));
}

#[test]
fn test_invalid_backend_rejected() {
    let output = svcgraph(&["analyze", "--backend", "nonsense"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid provider"));
}
