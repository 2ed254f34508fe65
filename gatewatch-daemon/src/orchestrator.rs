//! Daemon orchestration -- assembly and lifecycle management.
//!
//! The [`Orchestrator`] owns the single [`IngestionCoordinator`] the daemon
//! runs. It turns the loaded `GatewatchConfig` into a pipeline config,
//! connects the Kafka source, starts the coordinator, and then watches
//! two things until one of them ends the process:
//!
//! - a shutdown signal (`SIGTERM` or `SIGINT`)
//! - the periodic health check reporting that every partition worker exited
//!
//! Either way the coordinator is stopped before `run` returns.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;

use gatewatch_core::config::GatewatchConfig;
use gatewatch_core::pipeline::{HealthStatus, Pipeline};
use gatewatch_log_pipeline::{
    IngestionCoordinator, IngestionCoordinatorBuilder, KafkaSource, KafkaSourceConfig,
    MessageSource, PipelineConfig, ReqwestTransport, WebhookTransport,
};

/// Interval between coordinator health checks.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// The main daemon orchestrator.
pub struct Orchestrator<S: MessageSource, T: WebhookTransport> {
    coordinator: IngestionCoordinator<S, T>,
    health_interval: Duration,
}

impl Orchestrator<KafkaSource, ReqwestTransport> {
    /// Build the production orchestrator from a loaded configuration.
    ///
    /// Connects to the Kafka brokers; the daemon treats a failed connection
    /// as a startup failure.
    ///
    /// # Errors
    ///
    /// - Configuration fails validation
    /// - Broker connection fails
    pub async fn build_from_config(config: &GatewatchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

        let pipeline_config = PipelineConfig::from_core(config)
            .map_err(|e| anyhow::anyhow!("invalid pipeline configuration: {}", e))?;

        let source = KafkaSource::connect(KafkaSourceConfig::from_core(&config.source))
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect message source: {}", e))?;

        Self::from_parts(pipeline_config, source, ReqwestTransport::new())
    }
}

impl<S: MessageSource, T: WebhookTransport> Orchestrator<S, T> {
    /// Assemble an orchestrator from an already-built source and transport.
    pub fn from_parts(config: PipelineConfig, source: S, transport: T) -> Result<Self> {
        let coordinator = IngestionCoordinatorBuilder::new()
            .config(config)
            .source(source)
            .transport(transport)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build ingestion coordinator: {}", e))?;

        Ok(Self {
            coordinator,
            health_interval: HEALTH_CHECK_INTERVAL,
        })
    }

    /// Override the health check interval.
    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    /// Access the coordinator.
    pub fn coordinator(&self) -> &IngestionCoordinator<S, T> {
        &self.coordinator
    }

    /// Run until `SIGTERM` or `SIGINT` is received.
    ///
    /// # Errors
    ///
    /// - Signal handlers cannot be installed
    /// - The coordinator fails to start
    /// - Every partition worker exited before a shutdown signal arrived
    pub async fn run(&mut self) -> Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

        self.run_until(async move {
            tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            }
        })
        .await
    }

    /// Run until `shutdown` resolves or the coordinator becomes unhealthy.
    ///
    /// `shutdown` resolves to the name of the trigger, used for logging.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = &'static str>,
    {
        self.coordinator
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start ingestion coordinator: {}", e))?;

        tracing::info!(
            partitions = ?self.coordinator.partitions(),
            "gatewatch-daemon running"
        );

        let mut health = tokio::time::interval(self.health_interval);
        health.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // first tick fires immediately
        health.tick().await;

        tokio::pin!(shutdown);
        let outcome = loop {
            tokio::select! {
                signal = &mut shutdown => {
                    tracing::info!(signal, "shutdown signal received");
                    break Ok(());
                }
                _ = health.tick() => match self.coordinator.health_check().await {
                    HealthStatus::Healthy => {}
                    HealthStatus::Degraded(reason) => {
                        tracing::warn!(reason = %reason, "ingestion coordinator degraded");
                    }
                    HealthStatus::Unhealthy(reason) => {
                        tracing::error!(reason = %reason, "ingestion coordinator unhealthy, shutting down");
                        break Err(anyhow::anyhow!("ingestion coordinator unhealthy: {}", reason));
                    }
                }
            }
        };

        self.shutdown().await?;
        outcome
    }

    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping ingestion coordinator");
        self.coordinator
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop ingestion coordinator: {}", e))?;
        tracing::info!(stats = ?self.coordinator.worker_stats(), "gatewatch-daemon shut down");
        Ok(())
    }
}
