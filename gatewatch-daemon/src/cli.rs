//! CLI argument definitions for gatewatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use gatewatch_core::config::GatewatchConfig;

/// Gateway access log 5xx alerter.
///
/// Consumes nginx access logs from a Kafka topic and posts a webhook alert
/// for each distinct server error, suppressing repeats for a configurable TTL.
#[derive(Parser, Debug)]
#[command(name = "gatewatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to gatewatch.toml configuration file.
    #[arg(short, long, default_value = "/etc/gatewatch/gatewatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply CLI overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut GatewatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
    }
}
