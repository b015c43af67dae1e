//! Worker settings loaded from the JSON configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::TimeDelta;
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::{AppResult, EngineConfig, RetryPolicy, StorePolicy, MIN_CAPACITY};

/// Default settings file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "query-queue-config.json";
/// Default work-queue table.
pub const DEFAULT_TABLE: &str = "tblCRQueryQueue";
/// Placeholder replaced by the job signature in command templates.
pub const SIGNATURE_PLACEHOLDER: &str = "%s";

/// Root settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Log at debug level.
    #[serde(default)]
    pub debug: bool,
    /// Log file settings.
    #[serde(default)]
    pub logs: LogsConfig,
    /// Worker capacity settings.
    #[serde(default)]
    pub threads: ThreadsConfig,
    /// Work-queue database.
    pub mysql: MysqlConfig,
    /// Scheduler loop and commands.
    pub worker: WorkerConfig,
    /// Store error policy.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Log file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsConfig {
    /// Write logs to files under `path`.
    #[serde(default)]
    pub enabled: bool,
    /// Directory holding log files.
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    /// Size in MiB at which the log file is rotated.
    #[serde(default = "default_log_max_size")]
    pub max_size: u64,
    /// Rotated files kept next to the active one.
    #[serde(default = "default_log_max_count")]
    pub max_count: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            max_size: default_log_max_size(),
            max_count: default_log_max_count(),
        }
    }
}

/// Worker capacity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadsConfig {
    /// Total concurrent jobs across all classes.
    #[serde(default = "default_max_threads")]
    pub max: u32,
    /// Wait for running jobs on shutdown.
    #[serde(default = "default_true")]
    pub wait_to_finish: bool,
}

impl Default for ThreadsConfig {
    fn default() -> Self {
        Self {
            max: default_max_threads(),
            wait_to_finish: true,
        }
    }
}

/// Work-queue database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MysqlConfig {
    /// Server host.
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Server port; a number or a numeric string.
    #[serde(default = "default_port", deserialize_with = "de_port")]
    pub port: u16,
    /// Database name.
    #[serde(default)]
    pub database: String,
    /// User name.
    #[serde(default)]
    pub username: String,
    /// Password.
    #[serde(default)]
    pub password: String,
    /// Work-queue table name.
    #[serde(default = "default_table")]
    pub table: String,
    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection URL taking precedence over the fields above.
    #[serde(default, skip_serializing)]
    pub url: Option<String>,
}

/// Scheduler loop and command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    /// Ticks between two lookups.
    pub idle: u32,
    /// Tick length in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Program every command template is passed to.
    pub executable: String,
    /// Command templates per class.
    pub commands: CommandsConfig,
    /// Per-class process settings.
    #[serde(default)]
    pub processes: ProcessesConfig,
}

/// Command templates per class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Pending rows; contains one `%s` for the signature.
    pub single: String,
    /// Update rows; contains one `%s` for the signature.
    pub update: String,
    /// Maintenance; takes no argument.
    pub maintenance: String,
}

/// Per-class process settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessesConfig {
    /// Maintenance timer.
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

/// Maintenance timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Seconds between maintenance runs.
    pub idle: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self { idle: 3600 }
    }
}

/// Store error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreErrorMode {
    /// Exit on the first store error.
    #[default]
    FailFast,
    /// Retry, then skip the pass, behind a circuit breaker.
    Retry,
}

/// Store error policy settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Policy selection.
    #[serde(default)]
    pub on_error: StoreErrorMode,
    /// Retry tuning.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Breaker tuning.
    #[serde(default)]
    pub breaker: BreakerConfig,
}

/// Retry tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Attempts per store call.
    pub max_attempts: u32,
    /// First backoff in milliseconds.
    pub backoff_ms: u64,
    /// Backoff cap in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

/// Circuit breaker tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerConfig {
    /// Failed calls in a row that open the circuit.
    pub failure_threshold: u32,
    /// Seconds the circuit stays open.
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_secs: 30,
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("logs")
}
const fn default_log_max_size() -> u64 {
    10
}
const fn default_log_max_count() -> usize {
    5
}
fn default_max_threads() -> u32 {
    u32::try_from(num_cpus::get()).unwrap_or(u32::MAX).max(MIN_CAPACITY)
}
const fn default_true() -> bool {
    true
}
fn default_hostname() -> String {
    "localhost".into()
}
const fn default_port() -> u16 {
    3306
}
fn default_table() -> String {
    DEFAULT_TABLE.into()
}
const fn default_max_connections() -> u32 {
    5
}
const fn default_tick_ms() -> u64 {
    1000
}

fn de_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid port `{text}`: {e}"))),
    }
}

impl CommandsConfig {
    /// Validate placeholder usage in every template.
    pub fn validate(&self) -> Result<(), String> {
        for (name, template, placeholders) in [
            ("single", &self.single, 1),
            ("update", &self.update, 1),
            ("maintenance", &self.maintenance, 0),
        ] {
            if template.trim().is_empty() {
                return Err(format!("command `{name}` must not be empty"));
            }
            let found = template.matches(SIGNATURE_PLACEHOLDER).count();
            if found != placeholders {
                return Err(format!(
                    "command `{name}` must contain {placeholders} `{SIGNATURE_PLACEHOLDER}` placeholder(s), found {found}"
                ));
            }
        }
        Ok(())
    }
}

impl MysqlConfig {
    /// Validate connection settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_none() && self.database.trim().is_empty() {
            return Err("mysql.database must not be empty".into());
        }
        if self.table.is_empty()
            || !self
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(format!(
                "mysql.table `{}` must be a plain identifier (letters, digits, underscore)",
                self.table
            ));
        }
        if self.max_connections == 0 {
            return Err("mysql.maxConnections must be greater than 0".into());
        }
        Ok(())
    }
}

impl AppConfig {
    /// Validate all sections.
    pub fn validate(&self) -> Result<(), String> {
        if self.threads.max < MIN_CAPACITY {
            return Err(format!(
                "threads.max is too low: at least {MIN_CAPACITY} threads are required"
            ));
        }
        if self.worker.tick_ms == 0 {
            return Err("worker.tickMs must be greater than 0".into());
        }
        if self.worker.executable.trim().is_empty() {
            return Err("worker.executable must not be empty".into());
        }
        if i64::try_from(self.worker.processes.maintenance.idle)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .is_none()
        {
            return Err("worker.processes.maintenance.idle is out of range".into());
        }
        if self.logs.enabled && self.logs.max_size == 0 {
            return Err("logs.maxSize must be greater than 0".into());
        }
        if self.store.on_error == StoreErrorMode::Retry {
            if self.store.retry.max_attempts == 0 {
                return Err("store.retry.maxAttempts must be greater than 0".into());
            }
            if self.store.breaker.failure_threshold == 0 {
                return Err("store.breaker.failureThreshold must be greater than 0".into());
            }
        }
        self.worker
            .commands
            .validate()
            .map_err(|e| format!("worker.commands invalid: {e}"))?;
        self.mysql.validate()?;
        Ok(())
    }

    /// Parse settings from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, apply environment overrides, and validate a settings file.
    ///
    /// `DATABASE_URL`, when set, replaces the `mysql` connection fields.
    ///
    /// # Errors
    ///
    /// Unreadable file, malformed JSON, or failed validation.
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let mut cfg: Self = serde_json::from_str(&raw)
            .with_context(|| format!("cannot parse config file {}", path.display()))?;
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                cfg.mysql.url = Some(url);
            }
        }
        cfg.validate()
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        Ok(cfg)
    }

    /// Scheduler loop values.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            total_capacity: self.threads.max,
            wait_to_finish: self.threads.wait_to_finish,
            idle_ticks: self.worker.idle,
            tick: Duration::from_millis(self.worker.tick_ms),
            maintenance_idle: i64::try_from(self.worker.processes.maintenance.idle)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::zero()),
        }
    }

    /// Store policy selected by `store.onError`.
    #[must_use]
    pub const fn store_policy(&self) -> StorePolicy {
        match self.store.on_error {
            StoreErrorMode::FailFast => StorePolicy::FailFast,
            StoreErrorMode::Retry => StorePolicy::Retry(RetryPolicy {
                max_attempts: self.store.retry.max_attempts,
                backoff: Duration::from_millis(self.store.retry.backoff_ms),
                max_backoff: Duration::from_millis(self.store.retry.max_backoff_ms),
                failure_threshold: self.store.breaker.failure_threshold,
                cooldown: Duration::from_secs(self.store.breaker.cooldown_secs),
            }),
        }
    }
}
