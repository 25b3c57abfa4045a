//! CLI integration tests for tabload.
//!
//! These tests verify argument parsing, help output, and exit codes for the
//! error paths that fire before any extraction work starts.

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a command for the tabload binary.
fn cmd() -> Command {
    Command::cargo_bin("tabload").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_required_flags() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--load-mode"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tabload"));
}

// =============================================================================
// Argument Validation Tests
// =============================================================================

#[test]
fn test_source_and_load_mode_are_required() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("--source"));

    cmd()
        .args(["--source", "file"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--load-mode"));
}

#[test]
fn test_unsupported_load_mode_exits_before_extraction() {
    // No config file and no environment are provided: the mode check must
    // fire first, so the message names the mode rather than a missing file.
    cmd()
        .args(["--source", "file", "--load-mode", "foo"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Unsupported load mode: 'foo'"));
}

#[test]
fn test_unsupported_source_exits_nonzero() {
    cmd()
        .args(["--source", "kafka", "--load-mode", "copy"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Unsupported source: 'kafka'"));
}

#[test]
fn test_missing_config_file_fails() {
    cmd()
        .args([
            "--source",
            "file",
            "--load-mode",
            "copy",
            "--config",
            "does/not/exist.yaml",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_missing_postgres_dsn_is_fatal() {
    let dir = tempdir_with_settings();

    cmd()
        .env_remove("POSTGRES_DSN")
        .args(["--source", "file", "--load-mode", "copy"])
        .arg("--config")
        .arg(dir.path().join("settings.yaml"))
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("POSTGRES_DSN"));
}

fn tempdir_with_settings() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("settings.yaml"),
        "sources:\n  file:\n    path: data/users.csv\n    format: csv\nrun:\n  target_table: users\n",
    )
    .unwrap();
    dir
}
