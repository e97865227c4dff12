//! Layered configuration using Figment
//!
//! Configuration is merged from, lowest precedence first:
//! 1. Built-in defaults (the CLI defaults)
//! 2. A TOML file (`--config`, or `config/telemetry.toml` when present)
//! 3. Environment variables prefixed with `TELEMETRY_PCLOG_`, nested keys
//!    separated by `__` (e.g. `TELEMETRY_PCLOG_CONNECTION__PORT=9000`)
//! 4. Flags given explicitly on the command line
//!
//! # Example
//! ```no_run
//! use telemetry_pclog::config::{AppConfig, ConfigOverrides};
//!
//! let config = AppConfig::load(None, &ConfigOverrides::default())?;
//! println!("Target: {}:{}", config.connection.host, config.connection.port);
//! # Ok::<(), telemetry_pclog::error::AppError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use telemetry_client::{
    config::{
        DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_READ_TIMEOUT, DEFAULT_RETRY_DELAY,
        DEFAULT_WRITE_TIMEOUT,
    },
    ClientConfig, PollPolicy, RetryPolicy, DEFAULT_HOST, DEFAULT_PORT,
};

use crate::error::{AppError, AppResult};

/// Config file picked up when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config/telemetry.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "TELEMETRY_PCLOG_";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Endpoint, retry and polling settings
    pub connection: ConnectionConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Robot controller host
    pub host: String,
    /// Robot controller port
    pub port: u16,
    /// Reconnect forever
    pub infinite: bool,
    /// Attempts when not infinite
    pub attempts: u32,
    /// Poll selector: >= 0 delay in ms, -1 blocking read, <= -2 busy poll
    pub delay_ms: i64,
    /// Heartbeat period in milliseconds
    pub heartbeat_interval_ms: u64,
    /// Pause between infinite attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Blocking read deadline in milliseconds
    pub read_timeout_ms: u64,
    /// Heartbeat write deadline in milliseconds
    pub write_timeout_ms: u64,
    /// Optional connect deadline in milliseconds
    pub connect_timeout_ms: Option<u64>,
    /// Disable Nagle's algorithm
    pub nodelay: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            infinite: false,
            attempts: 1,
            delay_ms: -1,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL.as_millis() as u64,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT.as_millis() as u64,
            connect_timeout_ms: None,
            nodelay: true,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (pretty, compact, json)
    pub format: String,
    /// ANSI colors on stderr
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
            ansi: true,
        }
    }
}

/// Values given explicitly on the command line.
///
/// Unset fields are skipped when serialized so they never shadow file or
/// environment values.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    /// Connection overrides
    pub connection: ConnectionOverrides,
    /// Logging overrides
    pub logging: LoggingOverrides,
}

/// Connection fields settable from the CLI
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionOverrides {
    /// `--ip`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// `--port`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// `--infinite`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infinite: Option<bool>,
    /// `--attempts`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    /// `--delay`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<i64>,
}

/// Logging fields settable from the CLI
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoggingOverrides {
    /// `--log-level`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// `--log-format`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl AppConfig {
    /// Load defaults, file, environment and CLI overrides, in that order.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> AppResult<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(AppError::Configuration(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        Ok(Self::figment(path, overrides).extract()?)
    }

    /// The merged provider stack.
    pub fn figment(path: &Path, overrides: &ConfigOverrides) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(AppError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(AppError::Configuration(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_formats.join(", ")
            )));
        }

        self.client_config()?.validate()?;
        Ok(())
    }

    /// Convert into the record consumed by the client core.
    pub fn client_config(&self) -> AppResult<ClientConfig> {
        let conn = &self.connection;
        Ok(ClientConfig {
            host: conn.host.clone(),
            port: conn.port,
            retry: RetryPolicy::from_flags(conn.infinite, conn.attempts)?,
            poll: PollPolicy::from_delay_ms(conn.delay_ms),
            heartbeat_interval: Duration::from_millis(conn.heartbeat_interval_ms),
            retry_delay: Duration::from_millis(conn.retry_delay_ms),
            read_timeout: Duration::from_millis(conn.read_timeout_ms),
            write_timeout: Duration::from_millis(conn.write_timeout_ms),
            connect_timeout: conn.connect_timeout_ms.map(Duration::from_millis),
            nodelay: conn.nodelay,
        })
    }
}
