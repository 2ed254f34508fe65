use anyhow::Result;
use clap::Parser;

use gatewatch_core::config::GatewatchConfig;
use gatewatch_daemon::cli::DaemonCli;
use gatewatch_daemon::orchestrator::Orchestrator;
use gatewatch_daemon::{logging, metrics_server};
use gatewatch_log_pipeline::{KafkaSourceConfig, PipelineConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = GatewatchConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
    cli.apply_overrides(&mut config);

    validate(&config)?;
    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "gatewatch-daemon starting"
    );

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    let mut orchestrator = Orchestrator::build_from_config(&config).await?;
    orchestrator.run().await
}

fn validate(config: &GatewatchConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    PipelineConfig::from_core(config)
        .and_then(|c| c.validate())
        .map_err(|e| anyhow::anyhow!("invalid pipeline configuration: {}", e))?;
    KafkaSourceConfig::from_core(&config.source)
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid source configuration: {}", e))?;
    Ok(())
}
