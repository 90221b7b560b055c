// crates/license-authority-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and request construction.
// Purpose: Ensure CLI inputs map onto engine requests and fail closed.
// Dependencies: license-authority-cli main helpers
// ============================================================================

//! ## Overview
//! Validates clap wiring, `--flag` parsing, fire-time resolution, and the
//! config-driven commands against a temporary `SQLite` store.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;

use clap::CommandFactory;
use clap::Parser;
use license_authority_core::IssuanceChannel;
use tempfile::TempDir;
use time::OffsetDateTime;

use super::Cli;
use super::Commands;
use super::LicenseCommand;
use super::TaskCommand;
use super::TaskScheduleCommand;
use super::build_request;
use super::command_ca_init;
use super::command_config_validate;
use super::parse_flags;
use super::resolve_fire_at;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn issue_args(extra: &[&str]) -> Vec<String> {
    let mut args = vec![
        "license-authority",
        "license",
        "issue",
        "--name",
        "Ada",
        "--email",
        "ada@example.com",
        "--product",
        "platform-enterprise",
        "--cluster",
        "prod-1",
        "--days",
        "30",
    ];
    args.extend_from_slice(extra);
    args.into_iter().map(str::to_string).collect()
}

fn write_config(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("license-authority.toml");
    let content = format!(
        "[store]\nkind = \"sqlite\"\npath = \"{}\"\n\n[audit]\nsink = \"none\"\n",
        dir.path().join("authority.db").display()
    );
    fs::write(&path, content).expect("write config");
    path
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn issue_arguments_build_direct_request() {
    let cli = Cli::try_parse_from(issue_args(&["--flag", "tier=gold", "--flag", "seats=10"]))
        .expect("parse");
    let Commands::License {
        command: LicenseCommand::Issue(command),
    } = cli.command
    else {
        panic!("expected license issue");
    };
    let request = build_request(&command).expect("request");
    assert_eq!(request.channel, IssuanceChannel::Direct);
    assert_eq!(request.extension, time::Duration::days(30));
    assert_eq!(request.flags.get("tier"), Some("gold"));
    assert_eq!(request.flags.len(), 2);
}

#[test]
fn self_service_token_selects_channel() {
    let cli = Cli::try_parse_from(issue_args(&["--self-service", "tok-1"])).expect("parse");
    let Commands::License {
        command: LicenseCommand::Issue(command),
    } = cli.command
    else {
        panic!("expected license issue");
    };
    let request = build_request(&command).expect("request");
    assert_eq!(
        request.channel,
        IssuanceChannel::SelfService {
            token_id: "tok-1".to_string()
        }
    );
}

#[test]
fn zero_days_is_rejected_by_parser() {
    let mut args = issue_args(&[]);
    let last = args.len() - 1;
    args[last] = "0".to_string();
    assert!(Cli::try_parse_from(args).is_err());
}

#[test]
fn malformed_and_duplicate_flags_are_rejected() {
    assert!(parse_flags(&["no-separator".to_string()]).is_err());
    assert!(parse_flags(&["a=1".to_string(), "a=2".to_string()]).is_err());
}

#[test]
fn schedule_requires_exactly_one_fire_time() {
    let base = ["license-authority", "task", "schedule", "--payload", "x"];
    assert!(Cli::try_parse_from(base).is_err());
    let both = [
        "license-authority",
        "task",
        "schedule",
        "--payload",
        "x",
        "--at",
        "2030-01-01T00:00:00Z",
        "--in-secs",
        "5",
    ];
    assert!(Cli::try_parse_from(both).is_err());
}

#[test]
fn fire_time_resolves_from_offset_or_timestamp() {
    let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
    let relative = TaskScheduleCommand {
        at: None,
        in_secs: Some(90),
        payload: String::new(),
    };
    assert_eq!(resolve_fire_at(&relative, now).unwrap(), now + time::Duration::seconds(90));

    let absolute = TaskScheduleCommand {
        at: Some("2030-01-01T00:00:00Z".to_string()),
        in_secs: None,
        payload: String::new(),
    };
    assert_eq!(
        resolve_fire_at(&absolute, now).unwrap(),
        OffsetDateTime::from_unix_timestamp(1_893_456_000).unwrap()
    );

    let invalid = TaskScheduleCommand {
        at: Some("tomorrow".to_string()),
        in_secs: None,
        payload: String::new(),
    };
    assert!(resolve_fire_at(&invalid, now).is_err());
}

#[test]
fn task_run_once_parses() {
    let cli = Cli::try_parse_from(["license-authority", "task", "run", "--once"]).expect("parse");
    assert!(matches!(
        cli.command,
        Commands::Task {
            command: TaskCommand::Run(ref command)
        } if command.once
    ));
}

#[test]
fn config_commands_run_against_sqlite() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(&dir);
    assert!(command_config_validate(Some(&config)).is_ok());
    assert!(command_ca_init(Some(&config)).is_ok());
    assert!(dir.path().join("authority.db").exists());
}

#[test]
fn missing_config_fails_closed() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("absent.toml");
    assert!(command_config_validate(Some(&missing)).is_err());
}
