// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint persistence: load/save the alert store to a JSON file with
//! atomic writes (write tmp + rename).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CheckpointError;
use crate::metrics::Metrics;
use crate::model::{Checkpoint, CHECKPOINT_VERSION};

/// Durable storage for the alert store checkpoint between cycles.
#[async_trait]
pub trait CheckpointCodec: Send + Sync {
    async fn load(&self) -> Result<Checkpoint, CheckpointError>;
    async fn store(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;
}

/// File-backed checkpoint codec. Writes go to a `.tmp` sibling and are
/// renamed into place so a crash mid-write never corrupts the checkpoint
/// the next cycle reads.
pub struct FileCheckpointCodec {
    path: PathBuf,
    metrics: Arc<Metrics>,
}

impl FileCheckpointCodec {
    pub fn new(path: PathBuf, metrics: Arc<Metrics>) -> Self {
        Self { path, metrics }
    }
}

#[async_trait]
impl CheckpointCodec for FileCheckpointCodec {
    async fn load(&self) -> Result<Checkpoint, CheckpointError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Checkpoint::empty()),
            Err(e) => return Err(CheckpointError::Read(e)),
        };

        let checkpoint: Checkpoint = serde_json::from_str(&contents).map_err(CheckpointError::Serde)?;
        if checkpoint.version != CHECKPOINT_VERSION {
            self.metrics.checkpoint_version_mismatch_total.inc();
            tracing::warn!(
                found = checkpoint.version,
                expected = CHECKPOINT_VERSION,
                "checkpoint version mismatch, starting from an empty checkpoint"
            );
            return Ok(Checkpoint::empty());
        }
        Ok(checkpoint)
    }

    async fn store(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let json = serde_json::to_string_pretty(checkpoint).map_err(CheckpointError::Serde)?;
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, json).await.map_err(CheckpointError::Write)?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(CheckpointError::Write)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertInfo, AlertKey, AlertStore, Reason};
    use chrono::Utc;

    fn sample_checkpoint() -> Checkpoint {
        let mut store = AlertStore::new();
        let mut reasons = std::collections::BTreeMap::new();
        reasons.insert(
            Reason::DeviceCPUWarning,
            AlertInfo {
                resource_name: "edge-01".into(),
                resource_kind: "Device".into(),
                org_id: "acme".into(),
                reason: Reason::DeviceCPUWarning,
                summary: "cpu high".into(),
                starts_at: Utc::now(),
                ends_at: None,
            },
        );
        store.insert(AlertKey::new("acme", "Device", "edge-01"), reasons);
        Checkpoint { version: CHECKPOINT_VERSION, timestamp: Utc::now(), alerts: store }
    }

    #[tokio::test]
    async fn round_trips_through_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("checkpoint.json");
        let codec = FileCheckpointCodec::new(path, Arc::new(Metrics::new()?));

        let original = sample_checkpoint();
        codec.store(&original).await?;
        let loaded = codec.load().await?;

        assert_eq!(loaded.version, original.version);
        assert_eq!(loaded.alerts.len(), original.alerts.len());
        Ok(())
    }

    #[tokio::test]
    async fn missing_file_yields_empty_checkpoint() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("does-not-exist.json");
        let codec = FileCheckpointCodec::new(path, Arc::new(Metrics::new()?));

        let loaded = codec.load().await?;
        assert_eq!(loaded.version, CHECKPOINT_VERSION);
        assert!(loaded.alerts.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_version_falls_back_to_empty_checkpoint() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("checkpoint.json");
        tokio::fs::write(&path, r#"{"version":999,"timestamp":"2026-01-01T00:00:00Z","alerts":{}}"#).await?;

        let metrics = Arc::new(Metrics::new()?);
        let codec = FileCheckpointCodec::new(path, metrics.clone());
        let loaded = codec.load().await?;
        assert_eq!(loaded.version, CHECKPOINT_VERSION);
        assert!(loaded.alerts.is_empty());
        assert_eq!(metrics.checkpoint_version_mismatch_total.get(), 1);
        Ok(())
    }
}
