// crates/license-authority-config/src/config.rs
// ============================================================================
// Module: License Authority Configuration
// Description: Configuration loading and validation for the license authority.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: license-authority-core, license-authority-scheduler, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid in-memory setup.
//! Missing or invalid configuration fails closed: nothing is opened until
//! [`LicenseAuthorityConfig::validate`] passes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use license_authority_core::AuditSink;
use license_authority_core::AuthorityOptions;
use license_authority_core::BlobStore;
use license_authority_core::EmailPolicy;
use license_authority_core::FileAuditSink;
use license_authority_core::InMemoryBlobStore;
use license_authority_core::IssuerName;
use license_authority_core::IssuerOptions;
use license_authority_core::NoopAuditSink;
use license_authority_core::ProductDefinition;
use license_authority_core::ProductRegistry;
use license_authority_core::StderrAuditSink;
use license_authority_core::core::paths::validate_component;
use license_authority_core::core::paths::validate_path as validate_store_key;
use license_authority_core::runtime::authority::DEFAULT_CA_COMMON_NAME;
use license_authority_core::runtime::authority::DEFAULT_CA_VALIDITY_DAYS;
use license_authority_core::runtime::issuance::DEFAULT_MAX_EXTENSION_DAYS;
use license_authority_scheduler::SchedulerOptions;
use license_authority_scheduler::scheduler::DEFAULT_BUFFER_CAPACITY;
use license_authority_scheduler::scheduler::DEFAULT_MAX_PAYLOAD_BYTES;
use license_authority_scheduler::scheduler::DEFAULT_POOL_SIZE;
use license_authority_scheduler::scheduler::DEFAULT_TASK_PREFIX;
use license_authority_store_sqlite::MAX_BLOB_BYTES;
use license_authority_store_sqlite::SqliteBlobStore;
use license_authority_store_sqlite::SqliteStoreConfig;
use license_authority_store_sqlite::SqliteStoreMode;
use license_authority_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "license-authority.toml";
/// Environment variable used to locate the config file.
pub const CONFIG_ENV_VAR: &str = "LICENSE_AUTHORITY_CONFIG";
/// Maximum size of a config file in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum length of a full path.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for any day-denominated lifetime.
pub(crate) const MAX_LIFETIME_DAYS: i64 = 36_500;
/// Maximum root certificate common name length (X.520 upper bound).
pub(crate) const MAX_COMMON_NAME_LENGTH: usize = 64;
/// Maximum number of extra disposable domains.
pub(crate) const MAX_EXTRA_DISPOSABLE_DOMAINS: usize = 1_024;
/// Maximum DNS name length.
pub(crate) const MAX_DOMAIN_LENGTH: usize = 253;
/// Maximum number of product overrides.
pub(crate) const MAX_PRODUCTS: usize = 256;
/// Maximum features per product.
pub(crate) const MAX_PRODUCT_FEATURES: usize = 64;
/// Maximum product line code length.
pub(crate) const MAX_PRODUCT_LINE_LENGTH: usize = 16;
/// Maximum cleanup interval in seconds.
pub(crate) const MAX_CLEANUP_INTERVAL_SECS: u64 = 86_400;
/// Maximum idle buffers kept by the scheduler pool.
pub(crate) const MAX_POOL_SIZE: usize = 1_024;
/// Maximum initial capacity of scheduler buffers.
pub(crate) const MAX_BUFFER_CAPACITY: usize = 1024 * 1024;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// License authority configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LicenseAuthorityConfig {
    /// Blob store backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Certificate authority settings.
    #[serde(default)]
    pub authority: AuthorityConfig,
    /// Issuance engine settings.
    #[serde(default)]
    pub issuance: IssuanceConfig,
    /// Product definitions added to or replacing the built-in catalog.
    #[serde(default)]
    pub products: Vec<ProductDefinition>,
    /// Scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Audit sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl LicenseAuthorityConfig {
    /// Loads configuration using the default resolution rules.
    ///
    /// The path comes from `path`, then [`CONFIG_ENV_VAR`], then
    /// `license-authority.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.authority.validate()?;
        self.issuance.validate()?;
        validate_products(&self.products)?;
        self.scheduler.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Returns the built-in product catalog with configured overrides applied.
    #[must_use]
    pub fn product_registry(&self) -> ProductRegistry {
        let mut registry = ProductRegistry::builtin();
        for product in &self.products {
            registry.insert(product.clone());
        }
        registry
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Blob store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Process-local in-memory store.
    #[default]
    Memory,
    /// `SQLite`-backed durable store.
    Sqlite,
}

/// Blob store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(default)]
    pub kind: StoreKind,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            StoreKind::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreKind::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_store_path(path)?;
                if self.busy_timeout_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "store busy_timeout_ms must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Returns the `SQLite` settings when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.kind, &self.path) {
            (StoreKind::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }

    /// Opens the configured blob store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid or the
    /// backend cannot be opened.
    pub fn open(&self) -> Result<Arc<dyn BlobStore>, ConfigError> {
        self.validate()?;
        match self.sqlite_config() {
            Some(sqlite) => {
                let store =
                    SqliteBlobStore::new(&sqlite).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(store))
            }
            None => Ok(Arc::new(InMemoryBlobStore::new())),
        }
    }
}

// ============================================================================
// SECTION: Authority
// ============================================================================

/// Certificate authority configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorityConfig {
    /// Issuer namespace; omitted for the default issuer.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Root certificate common name.
    #[serde(default = "default_common_name")]
    pub common_name: String,
    /// Root certificate lifetime in days.
    #[serde(default = "default_ca_validity_days")]
    pub validity_days: u32,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            issuer: None,
            common_name: default_common_name(),
            validity_days: default_ca_validity_days(),
        }
    }
}

impl AuthorityConfig {
    /// Validates authority configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(issuer) = &self.issuer {
            validate_component("authority.issuer", issuer)
                .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        let common_name = self.common_name.trim();
        if common_name.is_empty() {
            return Err(ConfigError::Invalid("authority.common_name must be non-empty".to_string()));
        }
        if common_name.len() > MAX_COMMON_NAME_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "authority.common_name exceeds {MAX_COMMON_NAME_LENGTH} bytes"
            )));
        }
        if self.validity_days == 0 || i64::from(self.validity_days) > MAX_LIFETIME_DAYS {
            return Err(ConfigError::Invalid(format!(
                "authority.validity_days must be between 1 and {MAX_LIFETIME_DAYS}"
            )));
        }
        Ok(())
    }

    /// Returns CA bootstrap options.
    #[must_use]
    pub fn options(&self) -> AuthorityOptions {
        AuthorityOptions {
            issuer: self.issuer.as_ref().map_or_else(IssuerName::default_issuer, IssuerName::new),
            common_name: self.common_name.trim().to_string(),
            validity_days: self.validity_days,
        }
    }
}

// ============================================================================
// SECTION: Issuance
// ============================================================================

/// Issuance engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuanceConfig {
    /// Largest accepted validity extension in days.
    #[serde(default = "default_max_extension_days")]
    pub max_extension_days: i64,
    /// Disposable email domains added to the built-in denylist.
    #[serde(default)]
    pub extra_disposable_domains: Vec<String>,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            max_extension_days: default_max_extension_days(),
            extra_disposable_domains: Vec::new(),
        }
    }
}

impl IssuanceConfig {
    /// Validates issuance configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_extension_days <= 0 || self.max_extension_days > MAX_LIFETIME_DAYS {
            return Err(ConfigError::Invalid(format!(
                "issuance.max_extension_days must be between 1 and {MAX_LIFETIME_DAYS}"
            )));
        }
        if self.extra_disposable_domains.len() > MAX_EXTRA_DISPOSABLE_DOMAINS {
            return Err(ConfigError::Invalid(format!(
                "issuance.extra_disposable_domains exceeds {MAX_EXTRA_DISPOSABLE_DOMAINS} entries"
            )));
        }
        for domain in &self.extra_disposable_domains {
            let trimmed = domain.trim().trim_start_matches('.');
            if trimmed.is_empty() || trimmed.len() > MAX_DOMAIN_LENGTH {
                return Err(ConfigError::Invalid(
                    "issuance.extra_disposable_domains entries must be valid domains".to_string(),
                ));
            }
            if trimmed.chars().any(|ch| ch.is_whitespace() || ch == '@' || ch == '/') {
                return Err(ConfigError::Invalid(format!(
                    "issuance.extra_disposable_domains entry is not a domain: {trimmed}"
                )));
            }
        }
        Ok(())
    }

    /// Returns issuance engine options.
    #[must_use]
    pub fn options(&self) -> IssuerOptions {
        IssuerOptions {
            max_extension: time::Duration::days(self.max_extension_days),
            email_policy: EmailPolicy::with_extra_domains(self.extra_disposable_domains.iter()),
        }
    }
}

// ============================================================================
// SECTION: Products
// ============================================================================

/// Validates product overrides.
fn validate_products(products: &[ProductDefinition]) -> Result<(), ConfigError> {
    if products.len() > MAX_PRODUCTS {
        return Err(ConfigError::Invalid(format!("products exceeds {MAX_PRODUCTS} entries")));
    }
    let mut seen = BTreeSet::new();
    for product in products {
        let id = product.id.as_str();
        validate_component("products.id", id)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        if !seen.insert(id) {
            return Err(ConfigError::Invalid(format!("duplicate product id: {id}")));
        }
        if product.display_name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("product {id} display_name must be set")));
        }
        let line = product.product_line.trim();
        if line.is_empty() || line.len() > MAX_PRODUCT_LINE_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "product {id} product_line must be 1 to {MAX_PRODUCT_LINE_LENGTH} bytes"
            )));
        }
        if product.features.len() > MAX_PRODUCT_FEATURES {
            return Err(ConfigError::Invalid(format!(
                "product {id} exceeds {MAX_PRODUCT_FEATURES} features"
            )));
        }
        if product.features.iter().any(|feature| feature.is_empty() || feature.contains(',')) {
            return Err(ConfigError::Invalid(format!(
                "product {id} features must be non-empty and must not contain ','"
            )));
        }
        if product.community_ttl_days == 0
            || i64::from(product.community_ttl_days) > MAX_LIFETIME_DAYS
        {
            return Err(ConfigError::Invalid(format!(
                "product {id} community_ttl_days must be between 1 and {MAX_LIFETIME_DAYS}"
            )));
        }
        if product.max_clusters == Some(0) {
            return Err(ConfigError::Invalid(format!(
                "product {id} max_clusters must be greater than zero"
            )));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// Scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Store prefix holding task records.
    #[serde(default = "default_task_prefix")]
    pub prefix: String,
    /// Seconds between periodic cleanup passes.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Maximum task payload size in bytes.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    /// Idle record buffers kept by the pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Initial capacity of record buffers.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            prefix: default_task_prefix(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            max_payload_bytes: default_max_payload_bytes(),
            pool_size: default_pool_size(),
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

impl SchedulerConfig {
    /// Validates scheduler configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_store_key(self.prefix.trim_end_matches('/'))
            .map_err(|err| ConfigError::Invalid(format!("scheduler.prefix: {err}")))?;
        if self.cleanup_interval_secs == 0 || self.cleanup_interval_secs > MAX_CLEANUP_INTERVAL_SECS
        {
            return Err(ConfigError::Invalid(format!(
                "scheduler.cleanup_interval_secs must be between 1 and {MAX_CLEANUP_INTERVAL_SECS}"
            )));
        }
        // Leaves room for the fire time and separator within one blob.
        if self.max_payload_bytes == 0 || self.max_payload_bytes > MAX_BLOB_BYTES / 2 {
            return Err(ConfigError::Invalid(format!(
                "scheduler.max_payload_bytes must be between 1 and {}",
                MAX_BLOB_BYTES / 2
            )));
        }
        if self.pool_size > MAX_POOL_SIZE {
            return Err(ConfigError::Invalid(format!(
                "scheduler.pool_size must be at most {MAX_POOL_SIZE}"
            )));
        }
        if self.buffer_capacity > MAX_BUFFER_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "scheduler.buffer_capacity must be at most {MAX_BUFFER_CAPACITY}"
            )));
        }
        Ok(())
    }

    /// Returns scheduler options.
    #[must_use]
    pub fn options(&self) -> SchedulerOptions {
        SchedulerOptions {
            prefix: self.prefix.clone(),
            max_payload_bytes: self.max_payload_bytes,
            pool_size: self.pool_size,
            buffer_capacity: self.buffer_capacity,
        }
    }

    /// Returns the periodic cleanup interval.
    #[must_use]
    pub const fn cleanup_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.cleanup_interval_secs)
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard audit events.
    None,
}

/// Audit configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid or the log
    /// file cannot be opened.
    pub fn build_sink(&self) -> Result<Arc<dyn AuditSink>, ConfigError> {
        self.validate()?;
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => {
                let sink = FileAuditSink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
            (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
            _ => Ok(Arc::new(StderrAuditSink)),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration or opening a backend.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured filesystem path.
fn validate_path_string(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates the `SQLite` store path.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    validate_path_string("store.path", path)
}

/// Default `SQLite` busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    5_000
}

/// Default root certificate common name.
fn default_common_name() -> String {
    DEFAULT_CA_COMMON_NAME.to_string()
}

/// Default root certificate lifetime.
const fn default_ca_validity_days() -> u32 {
    DEFAULT_CA_VALIDITY_DAYS
}

/// Default maximum validity extension.
const fn default_max_extension_days() -> i64 {
    DEFAULT_MAX_EXTENSION_DAYS
}

/// Default scheduler prefix.
fn default_task_prefix() -> String {
    DEFAULT_TASK_PREFIX.to_string()
}

/// Default cleanup interval.
const fn default_cleanup_interval_secs() -> u64 {
    60
}

/// Default scheduler payload limit.
const fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

/// Default pool size.
const fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

/// Default buffer capacity.
const fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Section-level validation tests.
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn sqlite_config_carries_pragmas() {
        let store = StoreConfig {
            kind: StoreKind::Sqlite,
            path: Some(PathBuf::from("authority.db")),
            busy_timeout_ms: 250,
            journal_mode: SqliteStoreMode::Delete,
            sync_mode: SqliteSyncMode::Normal,
        };
        let sqlite = store.sqlite_config().expect("sqlite config");
        assert_eq!(sqlite.path, PathBuf::from("authority.db"));
        assert_eq!(sqlite.busy_timeout_ms, 250);
        assert_eq!(sqlite.journal_mode, SqliteStoreMode::Delete);
        assert_eq!(sqlite.sync_mode, SqliteSyncMode::Normal);
        assert!(StoreConfig::default().sqlite_config().is_none());
    }

    #[test]
    fn authority_options_default_to_default_issuer() {
        let options = AuthorityConfig::default().options();
        assert!(options.issuer.is_default());
        assert_eq!(options.validity_days, DEFAULT_CA_VALIDITY_DAYS);

        let named = AuthorityConfig {
            issuer: Some("partners".to_string()),
            ..AuthorityConfig::default()
        };
        assert_eq!(named.options().issuer.as_str(), "partners");
    }

    #[test]
    fn audit_path_requires_file_sink() {
        let stray = AuditConfig {
            sink: AuditSinkKind::Stderr,
            path: Some(PathBuf::from("audit.log")),
        };
        assert!(stray.validate().is_err());
        let missing = AuditConfig {
            sink: AuditSinkKind::File,
            path: None,
        };
        assert!(missing.validate().is_err());
    }

    #[test]
    fn scheduler_interval_converts_to_duration() {
        let config = SchedulerConfig {
            cleanup_interval_secs: 90,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.cleanup_interval(), StdDuration::from_secs(90));
    }
}
