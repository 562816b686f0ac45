//! CLI integration tests for taskdb-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions that need no running server.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

const DB_VARS: [&str; 8] = [
    "DB_HOST",
    "DB_PORT",
    "DB_USER",
    "DB_PASSWORD",
    "DB_NAME",
    "DB_SSL_MODE",
    "DB_CHARSET",
    "DB_COLLATION",
];

/// Get a command for the taskdb-migrate binary, isolated from `DB_*` variables.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("taskdb-migrate").unwrap();
    for var in DB_VARS {
        cmd.env_remove(var);
    }
    cmd
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create-db"))
        .stdout(predicate::str::contains("init-schema"))
        .stdout(predicate::str::contains("migrate-profile"))
        .stdout(predicate::str::contains("migrate-subtasks"))
        .stdout(predicate::str::contains("create-subtask-tables"))
        .stdout(predicate::str::contains("retire-schools"))
        .stdout(predicate::str::contains("reset"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("taskdb-migrate"));
}

#[test]
fn test_global_flags_listed() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--host"))
        .stdout(predicate::str::contains("--database"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_migrate_subcommand_help() {
    cmd()
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--create-db"));
}

#[test]
fn test_reset_subcommand_help() {
    cmd()
        .args(["reset", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_missing_user_exits_with_code_1() {
    cmd()
        .args(["--host", "127.0.0.1", "--database", "taskdb", "init-schema"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DB_USER"));
}

#[test]
fn test_missing_database_exits_with_code_1() {
    cmd()
        .args(["--host", "127.0.0.1", "--user", "taskapp", "migrate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DB_NAME"));
}

#[test]
fn test_invalid_database_name_exits_with_code_1() {
    cmd()
        .args([
            "--host",
            "127.0.0.1",
            "--user",
            "taskapp",
            "--database",
            "task-db; DROP",
            "create-db",
        ])
        .assert()
        .code(1);
}

#[test]
fn test_bad_port_env_exits_with_code_1() {
    cmd()
        .env("DB_PORT", "mysql")
        .args(["--host", "127.0.0.1", "--user", "taskapp", "health-check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DB_PORT"));
}

#[test]
fn test_reset_without_yes_refuses() {
    cmd()
        .args([
            "--host",
            "127.0.0.1",
            "--user",
            "taskapp",
            "--database",
            "taskdb",
            "reset",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn test_unknown_verbosity_exits_with_code_1() {
    cmd()
        .args(["--verbosity", "loud", "status"])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_yaml_without_host_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "connection:").unwrap();
    writeln!(file, "  user: taskapp").unwrap();
    writeln!(file, "  database: taskdb").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "status"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DB_HOST"));
}

// =============================================================================
// Exit Code Tests - IO and Connectivity
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7);
}

#[test]
fn test_refused_connection_exits_with_code_2() {
    cmd()
        .args([
            "--host",
            "127.0.0.1",
            "--port",
            "1",
            "--user",
            "taskapp",
            "--database",
            "taskdb",
            "init-schema",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("127.0.0.1:1"));
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
