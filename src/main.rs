//! CLI entry point for telemetry-pclog
//!
//! ```bash
//! telemetry-pclog --ip 192.168.49.1 -p 8333 -a 3 -d 100
//! telemetry-pclog -i -d -1 --log-level debug
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use telemetry_client::Shutdown;
use telemetry_pclog::{app, cli::Cli, config::AppConfig, logging};
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref(), &cli.overrides())
        .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    logging::init_from_config(&config.logging)?;

    let (trigger, shutdown) = Shutdown::channel();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                trigger.trigger();
            }
            Err(e) => warn!(error = %e, "Unable to listen for Ctrl-C"),
        }
    });

    app::run(&config, shutdown).await?;
    Ok(())
}
