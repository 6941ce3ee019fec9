// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration, parsed from CLI flags with environment fallbacks.

use std::time::Duration;

/// Top-level configuration for the alert engine.
#[derive(Debug, Clone, clap::Args)]
pub struct EngineConfig {
    /// Base URL of the upstream events API (organizations, events, database time).
    #[arg(long, env = "ALERT_ENGINE_EVENTS_API_BASE_URL")]
    pub events_api_base_url: String,

    /// Cycle period.
    #[arg(long, default_value_t = 60, env = "ALERT_ENGINE_POLL_INTERVAL_SECS")]
    pub poll_interval_secs: u64,

    /// Alertmanager host.
    #[arg(long, env = "ALERT_ENGINE_ALERTMANAGER_HOST")]
    pub alertmanager_host: String,

    /// Alertmanager port.
    #[arg(long, env = "ALERT_ENGINE_ALERTMANAGER_PORT")]
    pub alertmanager_port: u16,

    /// Path to the local checkpoint file.
    #[arg(
        long,
        default_value = "./checkpoint.json",
        env = "ALERT_ENGINE_CHECKPOINT_PATH"
    )]
    pub checkpoint_path: std::path::PathBuf,

    /// Host to bind the metrics/health server on.
    #[arg(long, default_value = "127.0.0.1", env = "ALERT_ENGINE_METRICS_HOST")]
    pub metrics_host: String,

    /// Port to bind the metrics/health server on.
    #[arg(long, default_value_t = 8081, env = "ALERT_ENGINE_METRICS_PORT")]
    pub metrics_port: u16,

    #[command(flatten)]
    pub alertmanager: AlertmanagerConfig,
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Construct a config with placeholder values, for use by tests that
    /// don't exercise the CLI/env parsing path.
    pub fn for_test() -> Self {
        Self {
            events_api_base_url: "http://127.0.0.1:0".to_owned(),
            poll_interval_secs: 60,
            alertmanager_host: "127.0.0.1".to_owned(),
            alertmanager_port: 0,
            checkpoint_path: std::path::PathBuf::from("./checkpoint.json"),
            metrics_host: "127.0.0.1".to_owned(),
            metrics_port: 0,
            alertmanager: AlertmanagerConfig::default(),
        }
    }
}

/// Retry/backoff configuration for the Alertmanager client.
#[derive(Debug, Clone, clap::Args)]
pub struct AlertmanagerConfig {
    /// Maximum number of retries per batch, clamped to 1..=10.
    #[arg(
        long = "alertmanager-max-retries",
        default_value_t = 3,
        env = "ALERT_ENGINE_ALERTMANAGER_MAX_RETRIES"
    )]
    pub max_retries: u32,

    /// Base retry delay in milliseconds.
    #[arg(
        long = "alertmanager-base-delay-ms",
        default_value_t = 500,
        env = "ALERT_ENGINE_ALERTMANAGER_BASE_DELAY_MS"
    )]
    pub base_delay_ms: u64,

    /// Maximum retry delay in milliseconds.
    #[arg(
        long = "alertmanager-max-delay-ms",
        default_value_t = 10_000,
        env = "ALERT_ENGINE_ALERTMANAGER_MAX_DELAY_MS"
    )]
    pub max_delay_ms: u64,
}

impl AlertmanagerConfig {
    /// Clamp `max_retries` to the documented 1..=10 range.
    pub fn clamped_max_retries(&self) -> u32 {
        self.max_retries.clamp(1, 10)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for AlertmanagerConfig {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 500, max_delay_ms: 10_000 }
    }
}
