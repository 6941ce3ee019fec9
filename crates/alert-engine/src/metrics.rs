// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide counters and gauges, exported on `GET /metrics` in the
//! Prometheus text exposition format.

use std::time::Duration;

use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub events_processed_total: IntCounter,
    pub events_invalid_total: IntCounter,
    pub alerts_created_total: IntCounter,
    pub alerts_resolved_total: IntCounter,
    pub active_alerts: IntGauge,
    pub orgs_failed_total: IntCounter,
    pub cycle_duration_seconds: HistogramVec,
    pub requests_total: IntCounterVec,
    pub retries_total: IntCounter,
    pub request_duration_seconds: HistogramVec,
    pub uptime_seconds: IntGauge,
    pub checkpoint_version_mismatch_total: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_processed_total =
            IntCounter::new("alert_engine_events_processed_total", "Total validated events applied to the alert store")?;
        let events_invalid_total =
            IntCounter::new("alert_engine_events_invalid_total", "Total events dropped during validation")?;
        let alerts_created_total = IntCounter::new("alert_engine_alerts_created_total", "Total alerts transitioned to active")?;
        let alerts_resolved_total =
            IntCounter::new("alert_engine_alerts_resolved_total", "Total alerts transitioned to resolved")?;
        let active_alerts = IntGauge::new("alert_engine_active_alerts", "Alerts currently active across all organizations")?;
        let orgs_failed_total =
            IntCounter::new("alert_engine_orgs_failed_total", "Organizations whose event listing failed in a cycle")?;
        let cycle_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new("alert_engine_cycle_duration_seconds", "Duration of each processing cycle phase"),
            &["phase"],
        )?;
        let requests_total = IntCounterVec::new(
            prometheus::Opts::new("alert_engine_requests_total", "Alertmanager delivery attempts by outcome"),
            &["status"],
        )?;
        let retries_total = IntCounter::new("alert_engine_retries_total", "Total Alertmanager delivery retries")?;
        let request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new("alert_engine_request_duration_seconds", "Alertmanager request latency"),
            &["status"],
        )?;
        let uptime_seconds = IntGauge::new("alert_engine_uptime_seconds", "Seconds since process start")?;
        let checkpoint_version_mismatch_total = IntCounter::new(
            "alert_engine_checkpoint_version_mismatch_total",
            "Checkpoint loads that fell back to an empty checkpoint due to a version mismatch",
        )?;

        registry.register(Box::new(events_processed_total.clone()))?;
        registry.register(Box::new(events_invalid_total.clone()))?;
        registry.register(Box::new(alerts_created_total.clone()))?;
        registry.register(Box::new(alerts_resolved_total.clone()))?;
        registry.register(Box::new(active_alerts.clone()))?;
        registry.register(Box::new(orgs_failed_total.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(retries_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(uptime_seconds.clone()))?;
        registry.register(Box::new(checkpoint_version_mismatch_total.clone()))?;

        Ok(Self {
            registry,
            events_processed_total,
            events_invalid_total,
            alerts_created_total,
            alerts_resolved_total,
            active_alerts,
            orgs_failed_total,
            cycle_duration_seconds,
            requests_total,
            retries_total,
            request_duration_seconds,
            uptime_seconds,
            checkpoint_version_mismatch_total,
        })
    }

    pub fn inc_requests_total(&self, status: &str) {
        self.requests_total.with_label_values(&[status]).inc();
    }

    pub fn inc_retries_total(&self) {
        self.retries_total.inc();
    }

    pub fn observe_request_duration(&self, elapsed: Duration) {
        self.request_duration_seconds.with_label_values(&["attempt"]).observe(elapsed.as_secs_f64());
    }

    pub fn observe_cycle_phase(&self, phase: &str, elapsed: Duration) {
        self.cycle_duration_seconds.with_label_values(&[phase]).observe(elapsed.as_secs_f64());
    }

    /// Render the full registry in the Prometheus text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
