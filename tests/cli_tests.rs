//! Tests for the `mailquery` binary.

use std::path::Path;
use std::process::{Command, Output};

use assert_fs::prelude::*;
use predicates::prelude::*;

/// Run the binary with a throwaway config so user settings and logs
/// never leak into the test.
fn run(dir: &assert_fs::TempDir, args: &[&str]) -> Output {
    let config = dir.child("config.toml");
    let cache = dir.child("cache");
    config
        .write_str(&format!(
            "[general]\ncache_dir = {:?}\nlog_level = \"warn\"\n",
            cache.path().display().to_string()
        ))
        .unwrap();

    Command::new(env!("CARGO_BIN_EXE_mailquery"))
        .args(args)
        .env("MAILQUERY_CONFIG", config.path())
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run mailquery")
}

fn copy_fixture(dir: &assert_fs::TempDir) -> assert_fs::fixture::ChildPath {
    let mailbox = dir.child("mailbox.json");
    mailbox
        .write_file(
            &Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("tests")
                .join("fixtures")
                .join("mailbox.json"),
        )
        .unwrap();
    mailbox
}

#[test]
fn test_search_json_output() {
    let dir = assert_fs::TempDir::new().unwrap();
    let mailbox = copy_fixture(&dir);
    let path = mailbox.path().to_string_lossy().into_owned();

    let output = run(&dir, &["search", &path, "budget", "-t", "message", "--json"]);
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["sort_by"], "dateDesc");
    assert_eq!(json["hits"].as_array().map(Vec::len), Some(3));
    assert!(predicate::str::contains("\"subject\": \"Budget follow-up\"").eval(&stdout));
}

#[test]
fn test_search_table_output() {
    let dir = assert_fs::TempDir::new().unwrap();
    let mailbox = copy_fixture(&dir);
    let path = mailbox.path().to_string_lossy().into_owned();

    let output = run(&dir, &["search", &path, "size:>1mb", "-t", "message"]);
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(predicate::str::contains("1 result(s), sorted by dateDesc").eval(&stdout));
    assert!(predicate::str::contains("Holiday photos").eval(&stdout));
}

#[test]
fn test_mark_read_is_saved() {
    let dir = assert_fs::TempDir::new().unwrap();
    let mailbox = copy_fixture(&dir);
    let path = mailbox.path().to_string_lossy().into_owned();

    let output = run(
        &dir,
        &[
            "search",
            &path,
            "is:unread",
            "-t",
            "message",
            "--fetch",
            "first",
            "--mark-read",
            "--save",
            "--json",
        ],
    );
    assert!(output.status.success(), "{output:?}");

    // Message 6 is the newest unread message and the only one expanded.
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(mailbox.path()).unwrap()).unwrap();
    let unread: Vec<u64> = saved["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|item| item["unread"] == true)
        .filter_map(|item| item["id"].as_u64())
        .collect();
    assert_eq!(unread, vec![1, 2]);
}

#[test]
fn test_missing_mailbox_fails() {
    let dir = assert_fs::TempDir::new().unwrap();
    let missing = dir.child("nope.json");
    missing.assert(predicate::path::missing());

    let path = missing.path().to_string_lossy().into_owned();
    let output = run(&dir, &["search", &path, "budget"]);
    assert!(!output.status.success());
    assert!(predicate::str::contains("Mailbox file not found")
        .eval(&String::from_utf8_lossy(&output.stderr)));
}

#[test]
fn test_explain_without_mailbox() {
    let dir = assert_fs::TempDir::new().unwrap();
    let output = run(&dir, &["explain", "budget -is:read"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(predicate::str::starts_with("Query: ").eval(&stdout));
    assert!(predicate::str::contains("pass --mailbox").eval(&stdout));
}

#[test]
fn test_log_file_goes_to_configured_cache_dir() {
    let dir = assert_fs::TempDir::new().unwrap();
    let mailbox = copy_fixture(&dir);
    let path = mailbox.path().to_string_lossy().into_owned();

    let output = run(&dir, &["search", &path, "--json"]);
    assert!(output.status.success(), "{output:?}");
    dir.child("cache").assert(predicate::path::is_dir());
    dir.child("cache")
        .child("mailquery.log")
        .assert(predicate::path::exists());
}
