use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::budget::UserId;
use crate::budget::http::parse_base_url;
use crate::enforcement::reporter::{
    DEFAULT_INTERVAL, DEFAULT_LOCKED_ROUTE, DEFAULT_WARNING_THRESHOLD_SECS,
};
use crate::enforcement::{Accounting, ReporterSettings};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub reporter: ReporterConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Budget service the reporter talks to
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api/parental-control".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// Account the usage is charged to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReporterConfig {
    /// Seconds between usage reports
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Warn once when the remaining time first drops to this many seconds
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold_secs: u64,

    #[serde(default)]
    pub accounting: Accounting,

    /// Add seconds from failed reports to the next one
    #[serde(default)]
    pub carry_unreported: bool,

    #[serde(default = "default_locked_route")]
    pub locked_route: String,

    /// Route shown when the application is not locked
    #[serde(default = "default_home_route")]
    pub home_route: String,

    /// What entering the locked route does to the desktop session
    #[serde(default)]
    pub lock_action: LockAction,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL.as_secs()
}

fn default_warning_threshold() -> u64 {
    DEFAULT_WARNING_THRESHOLD_SECS
}

fn default_locked_route() -> String {
    DEFAULT_LOCKED_ROUTE.to_string()
}

fn default_home_route() -> String {
    "/".to_string()
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            warning_threshold_secs: default_warning_threshold(),
            accounting: Accounting::default(),
            carry_unreported: false,
            locked_route: default_locked_route(),
            home_route: default_home_route(),
            lock_action: LockAction::default(),
        }
    }
}

impl ReporterConfig {
    pub fn to_settings(&self) -> ReporterSettings {
        ReporterSettings {
            interval: Duration::from_secs(self.interval_secs),
            warning_threshold_secs: self.warning_threshold_secs,
            accounting: self.accounting,
            carry_unreported: self.carry_unreported,
            locked_route: self.locked_route.clone(),
        }
    }
}

/// Action taken on the desktop session when time runs out
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LockAction {
    /// Lock the screen
    #[default]
    Lock,
    /// Log out the user
    Logout,
    /// Power off the computer
    Shutdown,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Local state file; platform default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Settings for `serve`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Users without an entry are unlimited
    #[serde(default)]
    pub allowances: Vec<AllowanceEntry>,
}

fn default_listen() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_base_path() -> String {
    "/api/parental-control".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            base_path: default_base_path(),
            allowances: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// PIN codes keyed by user
    pub fn pins(&self) -> HashMap<UserId, String> {
        self.allowances
            .iter()
            .filter_map(|a| Some((UserId::new(&a.user_id), a.pin_code.clone()?)))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AllowanceEntry {
    pub user_id: String,

    /// Seconds allowed per day
    pub daily_seconds: u64,

    /// Four-digit parent PIN for the unlock override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_code: Option<String>,
}

/// Get the platform-specific config file path
pub fn get_config_path() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Ok(PathBuf::from("/etc/family-screentime/config.toml"))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(PathBuf::from(
            "/Library/Application Support/family-screentime/config.toml",
        ))
    }

    #[cfg(target_os = "windows")]
    {
        let mut path = PathBuf::from(
            std::env::var("ProgramData").unwrap_or_else(|_| "C:\\ProgramData".to_string()),
        );
        path.push("family-screentime");
        path.push("config.toml");
        Ok(path)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        anyhow::bail!("Unsupported operating system");
    }
}

impl AppConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        Ok(config)
    }

    /// Load `explicit` if given. Otherwise load the platform config file, or
    /// fall back to defaults when it does not exist.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let path = get_config_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        crate::platform::common::atomic_write(path, content.as_bytes())
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        parse_base_url(&self.service.base_url).context("Invalid service.base_url")?;

        if self.service.timeout_secs == 0 {
            anyhow::bail!("service.timeout_secs must be at least 1");
        }

        if self.reporter.interval_secs == 0 {
            anyhow::bail!("reporter.interval_secs must be at least 1");
        }

        if self.reporter.warning_threshold_secs == 0 {
            anyhow::bail!("reporter.warning_threshold_secs must be greater than 0");
        }

        if self.reporter.locked_route.trim().is_empty() {
            anyhow::bail!("reporter.locked_route cannot be empty");
        }

        let base_path = &self.server.base_path;
        if !base_path.is_empty() && !base_path.starts_with('/') {
            anyhow::bail!("server.base_path must start with '/' (got: {})", base_path);
        }

        let mut ids = HashSet::new();
        for allowance in &self.server.allowances {
            if allowance.user_id.trim().is_empty() {
                anyhow::bail!("server.allowances: user_id cannot be empty");
            }
            if !ids.insert(allowance.user_id.as_str()) {
                anyhow::bail!("server.allowances: duplicate user_id {}", allowance.user_id);
            }
            if let Some(pin) = &allowance.pin_code {
                validate_pin(pin)
                    .with_context(|| format!("Invalid PIN for user {}", allowance.user_id))?;
            }
        }

        Ok(())
    }
}

fn validate_pin(pin: &str) -> Result<()> {
    if pin.len() != 4 || !pin.chars().all(|c| c.is_ascii_digit()) {
        anyhow::bail!("PIN must be exactly 4 digits");
    }
    Ok(())
}

/// Example configuration written by `config init`
pub const EXAMPLE_CONFIG: &str = include_str!("../example-config.toml");
