//! Prometheus metrics HTTP server.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`
//! to expose the scrape endpoint.

use std::net::SocketAddr;

use anyhow::Result;
use gatewatch_core::config::MetricsConfig;
use gatewatch_core::metrics as m;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

/// Install the global metrics recorder and start the HTTP listener.
///
/// Call once per process. Afterwards every `metrics::counter!()`,
/// `metrics::gauge!()` and `metrics::histogram!()` call is exported.
///
/// # Errors
///
/// - Endpoint other than `/metrics`
/// - Invalid listen address
/// - Socket binding fails or a global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is currently supported",
            config.endpoint
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(m::DISPATCH_DURATION_SECONDS.to_owned()),
            m::DISPATCH_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {}", e))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    m::describe_all();
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}
