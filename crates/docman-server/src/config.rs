//! Configuration loading and validation

use anyhow::{Context, Result, bail};
use chrono::Duration;
use docman_api::MasterAccount;
use docman_auth::PasswordParams;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Token lifetimes are capped at ten years
const MAX_TTL_MINUTES: i64 = 60 * 24 * 3650;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Document file storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC signing key; required
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_minutes: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_minutes: i64,
    #[serde(default)]
    pub password: PasswordConfig,
}

impl AuthConfig {
    /// Access token lifetime
    pub fn access_ttl(&self) -> Result<Duration> {
        ttl(self.access_token_ttl_minutes, "auth.access_token_ttl_minutes")
    }

    /// Refresh token lifetime
    pub fn refresh_ttl(&self) -> Result<Duration> {
        ttl(self.refresh_token_ttl_minutes, "auth.refresh_token_ttl_minutes")
    }
}

fn ttl(minutes: i64, key: &str) -> Result<Duration> {
    if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
        bail!("{} must be between 1 and {} minutes", key, MAX_TTL_MINUTES);
    }
    Duration::try_minutes(minutes).with_context(|| format!("{} is out of range", key))
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_token_ttl_minutes: default_access_ttl(),
            refresh_token_ttl_minutes: default_refresh_ttl(),
            password: PasswordConfig::default(),
        }
    }
}

/// Argon2 cost parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl PasswordConfig {
    pub fn params(&self) -> PasswordParams {
        PasswordParams {
            memory_kib: self.memory_kib,
            iterations: self.iterations,
            parallelism: self.parallelism,
        }
    }
}

/// Master account created on first start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_master_name")]
    pub master_name: String,
    #[serde(default = "default_master_email")]
    pub master_email: String,
    #[serde(default = "default_master_password")]
    pub master_password: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            master_name: default_master_name(),
            master_email: default_master_email(),
            master_password: default_master_password(),
        }
    }
}

impl BootstrapConfig {
    pub fn account(&self) -> MasterAccount {
        MasterAccount {
            name: self.master_name.clone(),
            email: self.master_email.clone(),
            password: self.master_password.clone(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3450
}

fn default_db_path() -> String {
    "./data/docman.db".to_string()
}

fn default_storage_path() -> String {
    "./data/documents".to_string()
}

fn default_max_upload_bytes() -> usize {
    200 * 1024 * 1024 // 200 MiB
}

fn default_access_ttl() -> i64 {
    24 * 60
}

fn default_refresh_ttl() -> i64 {
    7 * 24 * 60
}

fn default_memory_kib() -> u32 {
    19 * 1024
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

fn default_master_name() -> String {
    "master".to_string()
}

fn default_master_email() -> String {
    "master@email.com".to_string()
}

fn default_master_password() -> String {
    "copa2026".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from file; a missing file yields defaults
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<()> {
        match self.auth.jwt_secret.as_deref() {
            None | Some("") => bail!(
                "auth.jwt_secret is not set (use the config file, --jwt-secret or DOCMAN_JWT_SECRET)"
            ),
            Some(_) => {}
        }
        self.auth.access_ttl()?;
        self.auth.refresh_ttl()?;
        if self.storage.max_upload_bytes == 0 {
            bail!("storage.max_upload_bytes must be positive");
        }
        Ok(())
    }
}
