#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Smoke tests for the crudspec binary.

use std::fs;
use std::process::{Command, Stdio};
use tempfile::TempDir;

const MODEL: &str = "\
table: posts
fields:
  - name: ID
    type: bigint
    tag: id,pk
  - name: Title
    type: text
  - name: Score
    type: int
";

fn run_crudspec(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_crudspec"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute crudspec")
}

fn write(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn help_lists_subcommands() {
    let output = run_crudspec(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("explain"));
    assert!(stdout.contains("sanitize"));
    assert!(stdout.contains("config"));
}

#[test]
fn explain_prints_a_cursor_page() {
    let dir = TempDir::new().unwrap();
    let model = write(&dir, "posts.yaml", MODEL);
    let request = write(
        &dir,
        "request.json",
        r#"{
            "filters": [{"column": "title", "operator": "like", "value": "%rust%"}],
            "sort": [{"column": "score", "direction": "desc"}, {"column": "id", "direction": "desc"}],
            "cursor_forward": "42",
            "limit": 10
        }"#,
    );

    let output = run_crudspec(&["explain", "-m", &model, "-r", &request, "-d", "postgres"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "{stderr}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("SELECT posts.* FROM posts WHERE (posts.title LIKE $1) AND (EXISTS"));
    assert!(stdout.contains("ORDER BY posts.score DESC, posts.id DESC LIMIT 10;"));
    assert!(stdout.contains("-- 1 = '%rust%'"));
}

#[test]
fn fail_fast_rejects_unknown_columns() {
    let dir = TempDir::new().unwrap();
    let model = write(&dir, "posts.yaml", MODEL);
    let request = write(&dir, "request.yaml", "columns: [title, password]\n");

    let output = run_crudspec(&["explain", "-m", &model, "-r", &request, "--mode", "fail-fast"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid columns: password"), "{stderr}");
}

#[test]
fn sanitize_qualifies_known_columns() {
    let dir = TempDir::new().unwrap();
    let model = write(&dir, "posts.yaml", MODEL);

    let output = run_crudspec(&["sanitize", "-m", &model, "score > 3 AND title = 'x'"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "posts.score > 3 AND posts.title = 'x'"
    );
}

#[test]
fn config_reports_effective_settings() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "crudspec.yaml", "crudspec:\n  dialect: sqlite\n");

    let output = Command::new(env!("CARGO_BIN_EXE_crudspec"))
        .args(["config", "-c", &config])
        .env("CRUDSPEC__LIMITS__MAX", "300")
        .output()
        .expect("Failed to execute crudspec");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["crudspec"]["dialect"], "sqlite");
    assert_eq!(json["crudspec"]["limits"]["max"], 300);
    assert_eq!(json["crudspec"]["cursor_alias"], "cursor_select");
}
