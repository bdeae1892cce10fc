//! logbridge-daemon -- syslog/webhook to Kafka forwarding daemon.
//!
//! Loads configuration, connects one Kafka destination per `[[kafka]]`
//! entry, starts every configured listener, and waits for SIGTERM/SIGINT.

use anyhow::Result;
use clap::Parser;

use logbridge_core::config::LogbridgeConfig;
use logbridge_daemon::cli::DaemonCli;
use logbridge_daemon::logging;
use logbridge_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // Precedence: file < environment < command line
    let mut config = LogbridgeConfig::from_file(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "logbridge-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    tracing::info!("logbridge-daemon stopped");
    Ok(())
}
