// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types at each component seam. Cycle-level orchestration collapses
//! all of these into `anyhow::Error`; only the typed variants that drive
//! distinct control flow (retry vs. fatal, per-org vs. whole-cycle) are kept
//! as enums.

use thiserror::Error;

/// Errors from the event processor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Organization enumeration failed — aborts the whole cycle.
    #[error("failed to enumerate organizations: {0}")]
    Enumeration(#[source] anyhow::Error),

    /// A single organization's event listing failed — logged, cycle continues.
    #[error("failed to list events for org {org}: {source}")]
    Org {
        org: String,
        #[source]
        source: anyhow::Error,
    },

    /// Fetching the upstream database time failed — aborts the whole cycle.
    #[error("failed to fetch upstream database time: {0}")]
    DatabaseTime(#[source] anyhow::Error),
}

/// Errors from the Alertmanager client.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Transient failure; the caller should retry with backoff.
    #[error("retryable sink error: {0}")]
    Retryable(#[source] anyhow::Error),

    /// Permanent failure; retrying would not help.
    #[error("fatal sink error: {0}")]
    Fatal(#[source] anyhow::Error),
}

impl SinkError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SinkError::Retryable(_))
    }
}

/// Errors from the checkpoint codec.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to read checkpoint: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to write checkpoint: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to (de)serialize checkpoint: {0}")]
    Serde(#[source] serde_json::Error),
}
