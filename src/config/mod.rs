//! Configuration management
//!
//! This module handles loading and parsing configuration for the attendance QR service.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::services::window::WindowPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Attendance window configuration
    #[serde(default)]
    pub attendance: AttendanceConfig,
    /// QR image configuration
    #[serde(default)]
    pub qr: QrConfig,
    /// Periodic deactivation sweep
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/attendance.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Attendance window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceConfig {
    /// IANA timezone the windows are evaluated in
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Which tolerance formula closes a session
    #[serde(default)]
    pub window_policy: WindowPolicy,
    /// Page refresh interval in seconds
    #[serde(default = "default_refresh_seconds")]
    pub refresh_seconds: u64,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            window_policy: WindowPolicy::default(),
            refresh_seconds: default_refresh_seconds(),
        }
    }
}

fn default_timezone() -> String {
    "America/Lima".to_string()
}

fn default_refresh_seconds() -> u64 {
    60
}

impl AttendanceConfig {
    /// Parse the configured timezone name
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ConfigError::ValidationError(format!("unknown timezone '{}'", self.timezone))
        })
    }
}

/// QR image configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrConfig {
    /// Logo overlaid at the centre of the code; skipped when absent
    #[serde(default = "default_logo_path")]
    pub logo_path: PathBuf,
    /// Logo edge length in pixels
    #[serde(default = "default_logo_size")]
    pub logo_size: u32,
    /// Pixels per QR module
    #[serde(default = "default_module_size")]
    pub module_size: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            logo_path: default_logo_path(),
            logo_size: default_logo_size(),
            module_size: default_module_size(),
        }
    }
}

fn default_logo_path() -> PathBuf {
    PathBuf::from("logo.png")
}

fn default_logo_size() -> u32 {
    60
}

fn default_module_size() -> u32 {
    10
}

/// Periodic sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Run the background deactivation task
    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,
    /// Seconds between two sweeps
    #[serde(default = "default_sweep_interval")]
    pub interval_seconds: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweep_enabled(),
            interval_seconds: default_sweep_interval(),
        }
    }
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - QR_ATTENDANCE_SERVER_HOST
    /// - QR_ATTENDANCE_SERVER_PORT
    /// - QR_ATTENDANCE_DATABASE_DRIVER
    /// - QR_ATTENDANCE_DATABASE_URL
    /// - QR_ATTENDANCE_ATTENDANCE_TIMEZONE
    /// - QR_ATTENDANCE_ATTENDANCE_WINDOW_POLICY
    /// - QR_ATTENDANCE_ATTENDANCE_REFRESH_SECONDS
    /// - QR_ATTENDANCE_QR_LOGO_PATH
    /// - QR_ATTENDANCE_SWEEP_ENABLED
    /// - QR_ATTENDANCE_SWEEP_INTERVAL_SECONDS
    ///
    /// The result is validated before it is returned.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.attendance.tz()?;
        if self.attendance.refresh_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "attendance.refresh_seconds must be greater than zero".to_string(),
            ));
        }
        if self.sweep.interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "sweep.interval_seconds must be greater than zero".to_string(),
            ));
        }
        if self.qr.module_size == 0 {
            return Err(ConfigError::ValidationError(
                "qr.module_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("QR_ATTENDANCE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("QR_ATTENDANCE_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        // Database configuration
        if let Ok(driver) = std::env::var("QR_ATTENDANCE_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("QR_ATTENDANCE_DATABASE_URL") {
            self.database.url = url;
        }

        // Attendance configuration
        if let Ok(timezone) = std::env::var("QR_ATTENDANCE_ATTENDANCE_TIMEZONE") {
            self.attendance.timezone = timezone;
        }
        if let Ok(policy) = std::env::var("QR_ATTENDANCE_ATTENDANCE_WINDOW_POLICY") {
            if let Ok(policy) = policy.parse::<WindowPolicy>() {
                self.attendance.window_policy = policy;
            }
        }
        if let Ok(refresh) = std::env::var("QR_ATTENDANCE_ATTENDANCE_REFRESH_SECONDS") {
            if let Ok(refresh) = refresh.parse::<u64>() {
                self.attendance.refresh_seconds = refresh;
            }
        }

        // QR configuration
        if let Ok(path) = std::env::var("QR_ATTENDANCE_QR_LOGO_PATH") {
            self.qr.logo_path = PathBuf::from(path);
        }

        // Sweep configuration
        if let Ok(enabled) = std::env::var("QR_ATTENDANCE_SWEEP_ENABLED") {
            if let Ok(enabled) = enabled.parse::<bool>() {
                self.sweep.enabled = enabled;
            }
        }
        if let Ok(interval) = std::env::var("QR_ATTENDANCE_SWEEP_INTERVAL_SECONDS") {
            if let Ok(interval) = interval.parse::<u64>() {
                self.sweep.interval_seconds = interval;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "QR_ATTENDANCE_SERVER_HOST",
    "QR_ATTENDANCE_SERVER_PORT",
    "QR_ATTENDANCE_DATABASE_DRIVER",
    "QR_ATTENDANCE_DATABASE_URL",
    "QR_ATTENDANCE_ATTENDANCE_TIMEZONE",
    "QR_ATTENDANCE_ATTENDANCE_WINDOW_POLICY",
    "QR_ATTENDANCE_ATTENDANCE_REFRESH_SECONDS",
    "QR_ATTENDANCE_QR_LOGO_PATH",
    "QR_ATTENDANCE_SWEEP_ENABLED",
    "QR_ATTENDANCE_SWEEP_INTERVAL_SECONDS",
];
