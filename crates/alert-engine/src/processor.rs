// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drives one processing cycle: enumerate organizations, drain each one's
//! event listing since the last checkpoint, and fold every validated event
//! into the alert store. A single organization's listing failure is logged
//! and skipped rather than aborting the cycle; enumerating organizations or
//! fetching the upstream database time are whole-cycle failures.

use std::sync::Arc;

use crate::error::ProcessorError;
use crate::events_api::{list_all_events, EventsApi};
use crate::metrics::Metrics;
use crate::model::{Checkpoint, CHECKPOINT_VERSION};
use crate::state_machine::apply_event;

pub struct EventProcessor<A: EventsApi + ?Sized> {
    api: Arc<A>,
    metrics: Arc<Metrics>,
}

impl<A: EventsApi + ?Sized> EventProcessor<A> {
    pub fn new(api: Arc<A>, metrics: Arc<Metrics>) -> Self {
        Self { api, metrics }
    }

    /// Run one cycle, returning the checkpoint to persist afterwards. The
    /// returned checkpoint's `alerts` always starts from the previous
    /// checkpoint's store — a cycle only ever adds transitions on top of it.
    pub async fn process(&self, mut checkpoint: Checkpoint) -> Result<Checkpoint, ProcessorError> {
        let orgs = self
            .api
            .list_organizations()
            .await
            .map_err(ProcessorError::Enumeration)?;

        for org in &orgs {
            match list_all_events(self.api.as_ref(), &org.name, Some(checkpoint.timestamp)).await {
                Ok((events, invalid_count)) => {
                    self.metrics.events_invalid_total.inc_by(invalid_count);
                    for event in &events {
                        let outcome = apply_event(&mut checkpoint.alerts, event);
                        self.metrics.events_processed_total.inc();
                        self.metrics.alerts_created_total.inc_by(u64::from(outcome.created));
                        self.metrics.alerts_resolved_total.inc_by(u64::from(outcome.resolved));
                    }
                }
                Err(source) => {
                    self.metrics.orgs_failed_total.inc();
                    let err = ProcessorError::Org { org: org.name.clone(), source };
                    tracing::warn!(org = %org.name, error = %err, "skipping organization after listing failure");
                }
            }
        }

        let active: i64 = checkpoint
            .alerts
            .values()
            .flat_map(|reasons| reasons.values())
            .filter(|info| info.is_active())
            .count() as i64;
        self.metrics.active_alerts.set(active);

        let timestamp = self.api.database_time().await.map_err(ProcessorError::DatabaseTime)?;
        Ok(Checkpoint { version: CHECKPOINT_VERSION, timestamp, alerts: checkpoint.alerts })
    }
}
