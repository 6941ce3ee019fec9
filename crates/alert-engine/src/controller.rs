// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cycle controller: ticks on a fixed interval, runs Process -> Send ->
//! Store in order, and backs off the tick cadence when a cycle fails.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::alertmanager::AlertmanagerClient;
use crate::checkpoint::CheckpointCodec;
use crate::config::EngineConfig;
use crate::events_api::EventsApi;
use crate::metrics::Metrics;
use crate::model::Checkpoint;
use crate::processor::EventProcessor;

const CYCLE_TIMEOUT: Duration = Duration::from_secs(10);
const SLOW_CYCLE_THRESHOLD: Duration = Duration::from_secs(5);
/// Starting point for the cycle backoff, and what a success resets it to —
/// independent of `poll_interval`, matching `credential/refresh.rs`'s
/// `backoff = Duration::from_secs(1)` baseline.
const INITIAL_CYCLE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_CYCLE_BACKOFF: Duration = Duration::from_secs(60);

pub struct CycleController<A: EventsApi + ?Sized, C: CheckpointCodec> {
    processor: EventProcessor<A>,
    sink: AlertmanagerClient,
    codec: C,
    metrics: Arc<Metrics>,
    poll_interval: Duration,
    checkpoint: Checkpoint,
}

impl<A: EventsApi + ?Sized, C: CheckpointCodec> CycleController<A, C> {
    pub fn new(
        api: Arc<A>,
        sink: AlertmanagerClient,
        codec: C,
        metrics: Arc<Metrics>,
        config: &EngineConfig,
        checkpoint: Checkpoint,
    ) -> Self {
        Self {
            processor: EventProcessor::new(api, Arc::clone(&metrics)),
            sink,
            codec,
            metrics,
            poll_interval: config.poll_interval(),
            checkpoint,
        }
    }

    /// Run cycles on a fixed tick until `shutdown` is cancelled. Each cycle is
    /// bounded by [`CYCLE_TIMEOUT`]. The tick cadence itself never changes; a
    /// cycle that errors or times out additionally sleeps for a backoff that
    /// starts at [`INITIAL_CYCLE_BACKOFF`] and doubles on every consecutive
    /// failure (capped at [`MAX_CYCLE_BACKOFF`]), and a success resets it back
    /// to the same baseline — the `backoff = Duration::from_secs(1); ...
    /// backoff = (backoff * 2).min(max_backoff)` idiom used for token refresh
    /// retries elsewhere in this codebase.
    pub async fn run(mut self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut backoff = INITIAL_CYCLE_BACKOFF;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("cycle controller shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {}
            }

            let start = Instant::now();
            let failed = match tokio::time::timeout(CYCLE_TIMEOUT, self.run_cycle()).await {
                Ok(Ok(())) => {
                    let elapsed = start.elapsed();
                    self.metrics.observe_cycle_phase("cycle", elapsed);
                    if elapsed > SLOW_CYCLE_THRESHOLD {
                        tracing::warn!(elapsed_ms = elapsed.as_millis() as u64, "cycle took longer than expected");
                    }
                    backoff = INITIAL_CYCLE_BACKOFF;
                    false
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "cycle failed");
                    true
                }
                Err(_) => {
                    tracing::error!(timeout_secs = CYCLE_TIMEOUT.as_secs(), "cycle timed out");
                    true
                }
            };

            if failed {
                tokio::select! {
                    _ = shutdown.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(MAX_CYCLE_BACKOFF);
            }
        }
    }

    /// Run a single cycle immediately, bypassing the tick interval. Exposed
    /// for integration tests driving the controller without waiting out a
    /// real `poll_interval`. Opens the `processing_cycle` root span with
    /// child spans per phase, and records per-cycle counts and phase
    /// durations as span fields once the cycle completes.
    pub async fn run_cycle(&mut self) -> anyhow::Result<()> {
        let cycle_span = tracing::info_span!(
            "processing_cycle",
            events_processed = tracing::field::Empty,
            alerts_created = tracing::field::Empty,
            alerts_resolved = tracing::field::Empty,
            process_ms = tracing::field::Empty,
            send_ms = tracing::field::Empty,
            store_ms = tracing::field::Empty,
        );
        self.run_cycle_inner().instrument(cycle_span).await
    }

    async fn run_cycle_inner(&mut self) -> anyhow::Result<()> {
        let events_before = self.metrics.events_processed_total.get();
        let created_before = self.metrics.alerts_created_total.get();
        let resolved_before = self.metrics.alerts_resolved_total.get();

        let phase_start = Instant::now();
        let new_checkpoint =
            self.processor.process(self.checkpoint.clone()).instrument(tracing::info_span!("process")).await?;
        let process_elapsed = phase_start.elapsed();
        self.metrics.observe_cycle_phase("process", process_elapsed);

        let phase_start = Instant::now();
        self.sink
            .send(&new_checkpoint.alerts, &self.metrics)
            .instrument(tracing::info_span!("send"))
            .await?;
        let send_elapsed = phase_start.elapsed();
        self.metrics.observe_cycle_phase("send", send_elapsed);

        let phase_start = Instant::now();
        self.codec.store(&new_checkpoint).instrument(tracing::info_span!("store")).await?;
        let store_elapsed = phase_start.elapsed();
        self.metrics.observe_cycle_phase("store", store_elapsed);

        self.checkpoint = new_checkpoint;

        let span = tracing::Span::current();
        span.record("events_processed", self.metrics.events_processed_total.get() - events_before);
        span.record("alerts_created", self.metrics.alerts_created_total.get() - created_before);
        span.record("alerts_resolved", self.metrics.alerts_resolved_total.get() - resolved_before);
        span.record("process_ms", process_elapsed.as_millis() as u64);
        span.record("send_ms", send_elapsed.as_millis() as u64);
        span.record("store_ms", store_elapsed.as_millis() as u64);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlertmanagerConfig;
    use crate::events_api::{FakeEventsApi, Organization};
    use crate::model::{InvolvedObject, RawEvent};
    use chrono::Utc;

    struct InMemoryCheckpointCodec {
        stored: tokio::sync::Mutex<Option<Checkpoint>>,
    }

    impl InMemoryCheckpointCodec {
        fn new() -> Self {
            Self { stored: tokio::sync::Mutex::new(None) }
        }
    }

    #[async_trait::async_trait]
    impl CheckpointCodec for InMemoryCheckpointCodec {
        async fn load(&self) -> Result<Checkpoint, crate::error::CheckpointError> {
            Ok(self.stored.lock().await.clone().unwrap_or_default())
        }

        async fn store(&self, checkpoint: &Checkpoint) -> Result<(), crate::error::CheckpointError> {
            *self.stored.lock().await = Some(checkpoint.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn a_single_cycle_processes_sends_and_stores() -> anyhow::Result<()> {
        let now = Utc::now();
        let api = Arc::new(FakeEventsApi::new(vec![Organization { name: "acme".into(), display_name: "Acme".into() }], now));
        api.push_event(
            "acme",
            RawEvent {
                creation_timestamp: Some(now),
                reason: "DeviceCPUWarning".into(),
                involved_object: InvolvedObject { kind: "Device".into(), name: "edge-01".into() },
                event_type: "Warning".into(),
                message: "cpu high".into(),
            },
        );

        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/api/v2/alerts"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;
        let uri = mock_server.uri();
        let url = uri.trim_start_matches("http://");
        let (host, port) = url.split_once(':').ok_or_else(|| anyhow::anyhow!("mock server uri has no port"))?;

        let sink = AlertmanagerClient::new(host, port.parse()?, AlertmanagerConfig::default())?;
        let metrics = Arc::new(Metrics::new()?);
        let codec = InMemoryCheckpointCodec::new();
        let config = EngineConfig::for_test();

        let mut controller = CycleController::new(api, sink, codec, metrics.clone(), &config, Checkpoint::empty());
        controller.run_cycle().await?;

        assert_eq!(metrics.alerts_created_total.get(), 1);
        assert_eq!(metrics.events_processed_total.get(), 1);
        Ok(())
    }
}
