//! `telemetry-pclog`: echo a robot controller's telemetry stream to stdout.
//!
//! The connection, heartbeat, read loop and reconnect logic live in the
//! `telemetry-client` crate. This crate layers the process concerns on top:
//! - [`cli`]: command-line flags
//! - [`config`]: Figment-layered configuration (defaults, TOML, env, CLI)
//! - [`logging`]: tracing subscriber on stderr
//! - [`app`]: builds the client from config and runs it

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;

pub use error::{AppError, AppResult};
