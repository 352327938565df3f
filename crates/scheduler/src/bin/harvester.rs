//! harvester: multi-tenant cloud telemetry harvester.
//!
//! Discovers tenants from a credential directory, polls every namespace of
//! every tenant under a per-tenant dual rate limit and publishes the
//! normalized metrics over ZeroMQ.
//!
//! # Usage
//!
//! ```bash
//! # Defaults, with HARVEST_* overrides from the environment or .env
//! harvester
//!
//! # Explicit config file
//! harvester --config /etc/harvester/harvester.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use harvest_core::config::load_dotenv;
use harvest_core::HarvestConfig;
use harvest_scheduler::{FileTenantDirectory, Manager, ManagerSettings, ZmqWriter};
use harvest_vendor::HttpVendorApi;

/// Multi-tenant cloud telemetry harvester.
#[derive(Parser, Debug)]
#[command(name = "harvester", version, about)]
struct Cli {
    /// Path to a TOML config file. Without it, defaults plus env overrides apply.
    #[arg(long, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    /// Bind the PUB socket instead of connecting to the writer endpoint.
    #[arg(long, env = "HARVEST_WRITER_BIND", default_value_t = false)]
    bind: bool,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<HarvestConfig> {
    match path {
        Some(path) => HarvestConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => {
            let mut config = HarvestConfig::default();
            config.apply_env_overrides();
            config.validate().context("validating default config")?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!(?cli, "starting harvester");

    let config = load_config(cli.config.as_ref())?;
    config.log_summary();

    let api = HttpVendorApi::new(config.vendor.endpoint.as_str(), config.vendor.request_timeout)
        .context("building vendor client")?;
    let directory = FileTenantDirectory::new(config.directory.path.clone());
    let writer = if cli.bind {
        ZmqWriter::bind(&config.writer.endpoint).await
    } else {
        ZmqWriter::connect(&config.writer.endpoint).await
    }
    .context("opening metric writer")?;

    let manager = Arc::new(Manager::new(
        ManagerSettings::from(&config),
        Arc::new(directory),
        Arc::new(api),
        Arc::new(writer),
    ));
    manager.init().await;
    manager.start().await;

    shutdown_signal().await;
    tracing::info!("shutdown signal received");
    manager.close().await;

    tracing::info!("harvester exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for ctrl-c");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
