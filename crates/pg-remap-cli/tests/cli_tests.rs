//! CLI integration tests for pg-remap.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions that occur before a database
//! connection is opened.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the pg-remap binary.
fn cmd() -> Command {
    Command::cargo_bin("pg-remap").unwrap()
}

/// A config that parses and validates but points at nothing.
fn valid_config() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "database:").unwrap();
    writeln!(file, "  host: 127.0.0.1").unwrap();
    writeln!(file, "  port: 1").unwrap();
    writeln!(file, "  database: forum").unwrap();
    writeln!(file, "  user: forum").unwrap();
    writeln!(file, "  ssl_mode: disable").unwrap();
    file
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
        .stdout(predicate::str::contains("remap"))
        .stdout(predicate::str::contains("regexp-replace"))
        .stdout(predicate::str::contains("find"))
        .stdout(predicate::str::contains("columns"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_remap_subcommand_help() {
    cmd()
        .args(["remap", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<FROM>"))
        .stdout(predicate::str::contains("<TO>"))
        .stdout(predicate::str::contains("--exclude-table"))
        .stdout(predicate::str::contains("--skip-max-length-violations"))
        .stdout(predicate::str::contains("--verbose"))
        .stdout(predicate::str::contains("--anchor-left"))
        .stdout(predicate::str::contains("--anchor-right"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_regexp_replace_subcommand_help() {
    cmd()
        .args(["regexp-replace", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<PATTERN>"))
        .stdout(predicate::str::contains("<REPLACEMENT>"))
        .stdout(predicate::str::contains("--flags"))
        .stdout(predicate::str::contains("[default: g]"))
        .stdout(predicate::str::contains("--skip-max-length-violations"))
        .stdout(predicate::str::contains("--anchor-left").not());
}

#[test]
fn test_find_subcommand_help() {
    cmd()
        .args(["find", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<NEEDLE>"))
        .stdout(predicate::str::contains("--exclude-table"))
        .stdout(predicate::str::contains("--dry-run").not());
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pg-remap"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_log_format_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_invalid_log_format_exits_with_code_1() {
    cmd()
        .args(["--log-format", "xml", "health-check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid log format"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
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
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_required_fields_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "database:").unwrap();
    writeln!(file, "  host: localhost").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_single_connection_pool_rejected() {
    let mut file = valid_config();
    writeln!(file, "  max_connections: 1").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "columns"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("max_connections"));
}

#[test]
fn test_unknown_ssl_mode_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "database:").unwrap();
    writeln!(file, "  host: localhost").unwrap();
    writeln!(file, "  database: forum").unwrap();
    writeln!(file, "  user: forum").unwrap();
    writeln!(file, "  ssl_mode: sometimes").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ssl_mode"));
}

#[test]
fn test_unreachable_database_exits_with_code_3_and_logs_to_stdout() {
    let file = valid_config();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "columns"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("Loaded configuration"))
        .stderr(predicate::str::contains("Loaded configuration").not());
}

// =============================================================================
// Exit Code Tests - Pattern Errors (Exit Code 5)
// =============================================================================

#[test]
fn test_malformed_regex_exits_with_code_5_before_connecting() {
    let file = valid_config();

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "regexp-replace",
            "[img",
            "x",
        ])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("Invalid pattern"));
}

#[test]
fn test_unknown_regex_flag_exits_with_code_5() {
    let file = valid_config();

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "regexp-replace",
            "a",
            "b",
            "--flags",
            "gx",
        ])
        .assert()
        .code(5);
}

#[test]
fn test_empty_literal_exits_with_code_5() {
    let file = valid_config();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "remap", "", "x"])
        .assert()
        .code(5);
}

// =============================================================================
// Subcommand Existence Tests
// =============================================================================

#[test]
fn test_health_check_command_exists() {
    cmd()
        .args(["health-check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test the database connection"));
}

#[test]
fn test_columns_command_exists() {
    cmd()
        .args(["columns", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("List the text columns"));
}

#[test]
fn test_remap_requires_both_arguments() {
    cmd()
        .args(["remap", "only-from"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("<TO>"));
}

// =============================================================================
// Config Path Tests
// =============================================================================

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
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
