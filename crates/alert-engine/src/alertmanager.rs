// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batches the current alert store and POSTs it to an Alertmanager-compatible
//! sink at `/api/v2/alerts`, retrying transient failures with capped
//! exponential backoff. Generalizes the `backoff = (backoff * 2).min(max)`
//! idiom used throughout this codebase's reconnect loops into one reusable
//! policy instead of re-deriving it at every call site.

use std::time::Duration;

use serde::Serialize;

use crate::config::AlertmanagerConfig;
use crate::error::SinkError;
use crate::metrics::Metrics;
use crate::model::AlertStore;

const BATCH_SIZE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Wire record posted to `/api/v2/alerts`.
#[derive(Debug, Clone, Serialize)]
struct AlertRecord {
    labels: AlertLabels,
    #[serde(rename = "startsAt")]
    starts_at: String,
    #[serde(rename = "endsAt", skip_serializing_if = "Option::is_none")]
    ends_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct AlertLabels {
    alertname: String,
    resource: String,
    org_id: String,
}

fn to_records(store: &AlertStore) -> Vec<AlertRecord> {
    let total = store.values().map(|reasons| reasons.len()).sum();
    let mut records = Vec::with_capacity(total);
    for reasons in store.values() {
        for info in reasons.values() {
            records.push(AlertRecord {
                labels: AlertLabels {
                    alertname: info.reason.as_str().to_owned(),
                    resource: info.resource_name.clone(),
                    org_id: info.org_id.clone(),
                },
                starts_at: info.starts_at.to_rfc3339(),
                ends_at: info.ends_at.map(|t| t.to_rfc3339()),
            });
        }
    }
    records
}

/// Exponential backoff policy: `base * 2^attempt`, capped at `max`, exponent
/// clamped at 10 to avoid overflow.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.min(10);
        self.base.checked_mul(1u32 << shift).unwrap_or(self.max).min(self.max)
    }
}

/// Classify a transport-level error as retryable or not.
fn is_retryable_transport_error(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return true;
    }
    let text = err.to_string().to_lowercase();
    text.contains("connection refused") || text.contains("no such host")
}

/// Classify an HTTP status code as retryable.
fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}

/// HTTP client for an Alertmanager-compatible sink.
pub struct AlertmanagerClient {
    base_url: String,
    client: reqwest::Client,
    backoff: BackoffPolicy,
    max_retries: u32,
}

impl AlertmanagerClient {
    pub fn new(host: &str, port: u16, config: AlertmanagerConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: format!("http://{host}:{port}"),
            client,
            backoff: BackoffPolicy { base: config.base_delay(), max: config.max_delay() },
            max_retries: config.clamped_max_retries(),
        })
    }

    /// Serialize the complete current alert store and POST it to the sink in
    /// fixed-size batches, retrying each batch independently.
    pub async fn send(&self, store: &AlertStore, metrics: &Metrics) -> Result<(), SinkError> {
        let records = to_records(store);
        for batch in records.chunks(BATCH_SIZE) {
            self.send_batch_with_retry(batch, metrics).await?;
        }
        Ok(())
    }

    async fn send_batch_with_retry(&self, batch: &[AlertRecord], metrics: &Metrics) -> Result<(), SinkError> {
        let mut retries = 0u32;
        loop {
            let attempt_start = std::time::Instant::now();
            let result = self.post_batch(batch).await;
            metrics.observe_request_duration(attempt_start.elapsed());

            match result {
                Ok(()) => {
                    metrics.inc_requests_total("success");
                    if retries > 0 {
                        tracing::info!(retries, "alertmanager batch succeeded after retries");
                    }
                    return Ok(());
                }
                Err(e) if !e.is_retryable() => {
                    metrics.inc_requests_total("fatal");
                    return Err(e);
                }
                Err(e) => {
                    metrics.inc_requests_total("http_error");
                    if retries >= self.max_retries {
                        return Err(e);
                    }
                    let delay = self.backoff.delay_for_attempt(retries);
                    tracing::warn!(attempt = retries, err = %e, delay_ms = delay.as_millis() as u64, "alertmanager batch failed, retrying");
                    metrics.inc_retries_total();
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
            }
        }
    }

    async fn post_batch(&self, batch: &[AlertRecord]) -> Result<(), SinkError> {
        let resp = self
            .client
            .post(format!("{}/api/v2/alerts", self.base_url))
            .json(batch)
            .send()
            .await
            .map_err(|e| classify_transport_error(e))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if is_retryable_status(status) {
            Err(SinkError::Retryable(anyhow::anyhow!("alertmanager returned {status}")))
        } else {
            Err(SinkError::Fatal(anyhow::anyhow!("alertmanager returned {status}")))
        }
    }
}

fn classify_transport_error(err: reqwest::Error) -> SinkError {
    if is_retryable_transport_error(&err) {
        SinkError::Retryable(anyhow::Error::new(err))
    } else {
        SinkError::Fatal(anyhow::Error::new(err))
    }
}
