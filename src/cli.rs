//! Command-line surface
//!
//! Flags left off the command line stay `None` so they do not shadow values
//! from the config file or the environment.

use crate::config::{ConfigOverrides, ConnectionOverrides, LoggingOverrides};
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments
#[derive(Parser, Debug, Default)]
#[command(name = "telemetry-pclog")]
#[command(
    about = "Echo a robot controller's telemetry stream to stdout, reconnecting on loss",
    long_about = None
)]
pub struct Cli {
    /// Reconnect forever instead of a fixed number of attempts
    #[arg(short = 'i', long)]
    pub infinite: bool,

    /// Connection attempts when not infinite [default: 1]
    #[arg(short = 'a', long)]
    pub attempts: Option<u32>,

    /// Target host [default: 192.168.49.1]
    #[arg(long = "ip")]
    pub ip: Option<String>,

    /// Target port [default: 8333]
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Poll selector: >= 0 sleeps that many ms between reads, -1 blocks on
    /// read, <= -2 busy-polls [default: -1]
    #[arg(short = 'd', long, allow_negative_numbers = true)]
    pub delay: Option<i64>,

    /// TOML config file [default: config/telemetry.toml when present]
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long)]
    pub log_format: Option<String>,
}

impl Cli {
    /// The explicitly given flags as a configuration layer.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            connection: ConnectionOverrides {
                host: self.ip.clone(),
                port: self.port,
                infinite: self.infinite.then_some(true),
                attempts: self.attempts,
                delay_ms: self.delay,
            },
            logging: LoggingOverrides {
                level: self.log_level.clone(),
                format: self.log_format.clone(),
            },
        }
    }
}
