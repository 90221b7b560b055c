// crates/license-authority-cli/src/main.rs
// ============================================================================
// Module: License Authority CLI Entry Point
// Description: Command dispatcher for CA bootstrap, issuance, and scheduling.
// Purpose: Operate the license authority from a shell against a configured store.
// Dependencies: clap, license-authority-config, license-authority-core, license-authority-scheduler, tokio
// ============================================================================

//! ## Overview
//! The `license-authority` binary loads `license-authority.toml` (fail-closed),
//! opens the configured blob store and audit sink, and runs one command:
//!
//! - `ca init` bootstraps or loads the root CA and prints its certificate.
//! - `license issue` runs the issuance engine for one request.
//! - `task schedule` persists a deferred task for a later `task run`.
//! - `task run` reconciles persisted tasks, then keeps cleaning up until
//!   Ctrl-C.
//! - `config validate` loads and validates a config file.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use license_authority_config::LicenseAuthorityConfig;
use license_authority_core::AuditSink;
use license_authority_core::BlobStore;
use license_authority_core::CertificateAuthority;
use license_authority_core::Clock;
use license_authority_core::ClusterId;
use license_authority_core::FeatureFlags;
use license_authority_core::IssuanceChannel;
use license_authority_core::LicenseIssuer;
use license_authority_core::LicenseRequest;
use license_authority_core::ProductId;
use license_authority_core::SchedulerEvent;
use license_authority_core::SystemClock;
use license_authority_core::core::time::format_rfc3339;
use license_authority_core::core::time::parse_rfc3339;
use license_authority_scheduler::CleanupReport;
use license_authority_scheduler::DurableScheduler;
use license_authority_scheduler::TaskCallback;
use license_authority_scheduler::TaskError;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "license-authority", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (defaults to license-authority.toml or `LICENSE_AUTHORITY_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Certificate authority utilities.
    Ca {
        /// Selected CA subcommand.
        #[command(subcommand)]
        command: CaCommand,
    },
    /// License issuance utilities.
    License {
        /// Selected license subcommand.
        #[command(subcommand)]
        command: LicenseCommand,
    },
    /// Durable task utilities.
    Task {
        /// Selected task subcommand.
        #[command(subcommand)]
        command: TaskCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// CA subcommands.
#[derive(Subcommand, Debug)]
enum CaCommand {
    /// Bootstrap (or load) the root CA and print its certificate.
    Init,
}

/// License subcommands.
#[derive(Subcommand, Debug)]
enum LicenseCommand {
    /// Issue (or reuse) a license credential.
    Issue(LicenseIssueCommand),
}

/// Arguments for `license issue`.
#[derive(Args, Debug)]
struct LicenseIssueCommand {
    /// Subject display name.
    #[arg(long)]
    name: String,
    /// Subject email address.
    #[arg(long)]
    email: String,
    /// Product identifier.
    #[arg(long)]
    product: String,
    /// Cluster identifier (DNS-safe label).
    #[arg(long)]
    cluster: String,
    /// Requested validity extension in days.
    #[arg(long, value_parser = clap::value_parser!(i64).range(1 ..))]
    days: i64,
    /// Feature flag to embed, repeatable.
    #[arg(long = "flag", value_name = "KEY=VALUE")]
    flags: Vec<String>,
    /// Self-service token identifier; omit for direct issuance.
    #[arg(long, value_name = "TOKEN")]
    self_service: Option<String>,
    /// Write the certificate and key PEM bundle to this file instead of stdout.
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
}

/// Task subcommands.
#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// Persist a deferred task.
    Schedule(TaskScheduleCommand),
    /// Run due tasks and keep cleaning up until interrupted.
    Run(TaskRunCommand),
}

/// Arguments for `task schedule`.
#[derive(Args, Debug)]
struct TaskScheduleCommand {
    /// Fire time (RFC 3339).
    #[arg(long, value_name = "RFC3339", conflicts_with = "in_secs", required_unless_present = "in_secs")]
    at: Option<String>,
    /// Fire after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    in_secs: Option<u64>,
    /// Task payload text.
    #[arg(long)]
    payload: String,
}

/// Arguments for `task run`.
#[derive(Args, Debug)]
struct TaskRunCommand {
    /// Run one cleanup pass and exit.
    #[arg(long)]
    once: bool,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a license authority configuration file.
    Validate,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Ca {
            command: CaCommand::Init,
        } => command_ca_init(config_path),
        Commands::License {
            command: LicenseCommand::Issue(command),
        } => command_license_issue(config_path, &command),
        Commands::Task {
            command,
        } => match command {
            TaskCommand::Schedule(command) => command_task_schedule(config_path, &command),
            TaskCommand::Run(command) => command_task_run(config_path, &command).await,
        },
        Commands::Config {
            command: ConfigCommand::Validate,
        } => command_config_validate(config_path),
    }
}

// ============================================================================
// SECTION: Services
// ============================================================================

/// Backends opened from configuration.
struct Services {
    /// Validated configuration.
    config: LicenseAuthorityConfig,
    /// Shared blob store.
    store: Arc<dyn BlobStore>,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Wall clock.
    clock: Arc<dyn Clock>,
}

impl Services {
    /// Loads configuration and opens the store and audit sink.
    fn open(config_path: Option<&Path>) -> CliResult<Self> {
        let config = LicenseAuthorityConfig::load(config_path)
            .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
        let audit = config
            .audit
            .build_sink()
            .map_err(|err| CliError::new(format!("failed to open audit sink: {err}")))?;
        let store = config
            .store
            .open()
            .map_err(|err| CliError::new(format!("failed to open store: {err}")))?;
        Ok(Self {
            config,
            store,
            audit,
            clock: Arc::new(SystemClock),
        })
    }

    /// Bootstraps or loads the certificate authority.
    fn authority(&self) -> CliResult<CertificateAuthority> {
        CertificateAuthority::get_or_init(
            self.store.as_ref(),
            &self.config.authority.options(),
            self.clock.as_ref(),
            self.audit.as_ref(),
        )
        .map_err(|err| CliError::new(format!("certificate authority unavailable: {err}")))
    }

    /// Builds a scheduler over the shared store.
    fn scheduler(&self) -> CliResult<DurableScheduler> {
        DurableScheduler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.config.scheduler.options(),
            Arc::clone(&self.audit),
        )
        .map_err(|err| CliError::new(format!("failed to start scheduler: {err}")))
    }

    /// Closes the store handle.
    fn close(&self) -> CliResult<()> {
        self.store.close().map_err(|err| CliError::new(format!("failed to close store: {err}")))
    }
}

/// Task callback that records each payload as an audit event.
struct AuditCallback {
    /// Destination for task payload events.
    audit: Arc<dyn AuditSink>,
}

#[async_trait]
impl TaskCallback for AuditCallback {
    async fn run(&self, payload: &[u8]) -> Result<(), TaskError> {
        self.audit.record_scheduler(
            &SchedulerEvent::new("task_payload", None)
                .with_message(String::from_utf8_lossy(payload).into_owned()),
        );
        Ok(())
    }
}

// ============================================================================
// SECTION: CA Commands
// ============================================================================

/// Executes `ca init`.
fn command_ca_init(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let services = Services::open(config_path)?;
    let authority = services.authority();
    services.close()?;
    let authority = authority?;
    write_stdout_bytes(authority.certificate_pem().as_bytes())
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: License Commands
// ============================================================================

/// Executes `license issue`.
fn command_license_issue(
    config_path: Option<&Path>,
    command: &LicenseIssueCommand,
) -> CliResult<ExitCode> {
    let request = build_request(command)?;
    let services = Services::open(config_path)?;
    let issued = services.authority().and_then(|authority| {
        let issuer = LicenseIssuer::new(
            Arc::clone(&services.store),
            Arc::new(authority),
            services.config.product_registry(),
            Arc::clone(&services.clock),
            Arc::clone(&services.audit),
            services.config.issuance.options(),
        );
        issuer
            .issue(&request)
            .map_err(|err| CliError::new(format!("license issuance failed: {err}")))
    });
    services.close()?;
    let issued = issued?;

    let bundle = format!("{}{}", issued.certificate_pem, issued.private_key_pem);
    match &command.out {
        Some(path) => fs::write(path, bundle.as_bytes()).map_err(|err| {
            CliError::new(format!("failed to write {}: {err}", path.display()))
        })?,
        None => write_stdout_bytes(bundle.as_bytes())
            .map_err(|err| CliError::new(output_error("stdout", &err)))?,
    }
    let entry = serde_json::to_string_pretty(&issued.log_entry)
        .map_err(|err| CliError::new(format!("failed to encode log entry: {err}")))?;
    write_stdout_line(&entry).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Builds a license request from CLI arguments.
fn build_request(command: &LicenseIssueCommand) -> CliResult<LicenseRequest> {
    let flags = parse_flags(&command.flags)?;
    let channel = match &command.self_service {
        Some(token_id) => IssuanceChannel::SelfService {
            token_id: token_id.clone(),
        },
        None => IssuanceChannel::Direct,
    };
    Ok(LicenseRequest {
        name: command.name.clone(),
        email: command.email.clone(),
        product: ProductId::new(command.product.as_str()),
        cluster: ClusterId::new(command.cluster.as_str()),
        extension: time::Duration::days(command.days),
        flags,
        channel,
    })
}

/// Parses repeated `KEY=VALUE` flag arguments.
fn parse_flags(raw: &[String]) -> CliResult<FeatureFlags> {
    let mut flags = FeatureFlags::new();
    for entry in raw {
        let (key, value) = FeatureFlags::parse_assignment(entry)
            .map_err(|err| CliError::new(format!("invalid --flag: {err}")))?;
        flags.insert(key, value).map_err(|err| CliError::new(format!("invalid --flag: {err}")))?;
    }
    Ok(flags)
}

// ============================================================================
// SECTION: Task Commands
// ============================================================================

/// Executes `task schedule`.
fn command_task_schedule(
    config_path: Option<&Path>,
    command: &TaskScheduleCommand,
) -> CliResult<ExitCode> {
    let services = Services::open(config_path)?;
    let fire_at = resolve_fire_at(command, services.clock.now())?;
    let scheduler = services.scheduler()?;
    let callback: Arc<dyn TaskCallback> = Arc::new(AuditCallback {
        audit: Arc::clone(&services.audit),
    });
    let scheduled = scheduler.schedule(fire_at, callback, command.payload.as_bytes());
    scheduler.close().map_err(|err| CliError::new(format!("failed to close scheduler: {err}")))?;
    let id = scheduled.map_err(|err| CliError::new(format!("failed to schedule task: {err}")))?;
    write_stdout_line(&format!("scheduled task {id} at {}", format_rfc3339(fire_at)))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Resolves the fire time from `--at` or `--in-secs`.
fn resolve_fire_at(
    command: &TaskScheduleCommand,
    now: OffsetDateTime,
) -> CliResult<OffsetDateTime> {
    match (&command.at, command.in_secs) {
        (Some(at), _) => parse_rfc3339(at)
            .map_err(|err| CliError::new(format!("invalid --at timestamp: {err}"))),
        (None, Some(secs)) => {
            let secs = i64::try_from(secs)
                .map_err(|_| CliError::new("--in-secs is out of range".to_string()))?;
            now.checked_add(time::Duration::seconds(secs))
                .ok_or_else(|| CliError::new("--in-secs is out of range".to_string()))
        }
        (None, None) => Err(CliError::new("either --at or --in-secs is required".to_string())),
    }
}

/// Executes `task run`.
async fn command_task_run(
    config_path: Option<&Path>,
    command: &TaskRunCommand,
) -> CliResult<ExitCode> {
    let services = Services::open(config_path)?;
    let scheduler = services.scheduler()?;
    let callback: Arc<dyn TaskCallback> = Arc::new(AuditCallback {
        audit: Arc::clone(&services.audit),
    });
    let report = match scheduler.cleanup(Arc::clone(&callback)).await {
        Ok(report) => report,
        Err(err) => {
            let _ = scheduler.close();
            return Err(CliError::new(format!("cleanup failed: {err}")));
        }
    };
    write_stdout_line(&format_report(&report))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    if command.once {
        scheduler
            .close()
            .map_err(|err| CliError::new(format!("failed to close scheduler: {err}")))?;
        return Ok(ExitCode::SUCCESS);
    }

    let handle = scheduler
        .start_periodic_cleanup(services.config.scheduler.cleanup_interval(), callback)
        .map_err(|err| CliError::new(format!("failed to start cleanup loop: {err}")))?;
    let signal = tokio::signal::ctrl_c().await;
    scheduler.close().map_err(|err| CliError::new(format!("failed to close scheduler: {err}")))?;
    let _ = handle.await;
    signal.map_err(|err| CliError::new(format!("failed to wait for ctrl-c: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Formats a cleanup report for stdout.
fn format_report(report: &CleanupReport) -> String {
    format!(
        "cleanup: executed={} failed={} rearmed={} malformed={} skipped={}",
        report.executed, report.failed, report.rearmed, report.malformed, report.skipped
    )
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes `config validate`.
fn command_config_validate(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let _config = LicenseAuthorityConfig::load(config_path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
