// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core data model: alert identity, alert records, the alert store, and the
//! versioned checkpoint snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite identity `org:kind:name`. Two events share a key iff they concern
/// the same resource within the same tenant. Equality is byte-wise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertKey(String);

impl AlertKey {
    pub fn new(org: &str, kind: &str, name: &str) -> Self {
        Self(format!("{org}:{kind}:{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AlertKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The condition asserted by an event, e.g. `DeviceCPUCritical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Reason {
    DeviceApplicationDegraded,
    DeviceApplicationError,
    DeviceApplicationHealthy,
    DeviceCPUWarning,
    DeviceCPUCritical,
    DeviceCPUNormal,
    DeviceMemoryWarning,
    DeviceMemoryCritical,
    DeviceMemoryNormal,
    DeviceDiskWarning,
    DeviceDiskCritical,
    DeviceDiskNormal,
    DeviceDisconnected,
    DeviceConnected,
    ResourceDeleted,
    DeviceDecommissioned,
}

impl Reason {
    /// All sixteen reasons the processor's field selector asks for.
    pub const ALL: [Reason; 16] = [
        Reason::DeviceApplicationDegraded,
        Reason::DeviceApplicationError,
        Reason::DeviceApplicationHealthy,
        Reason::DeviceCPUWarning,
        Reason::DeviceCPUCritical,
        Reason::DeviceCPUNormal,
        Reason::DeviceMemoryWarning,
        Reason::DeviceMemoryCritical,
        Reason::DeviceMemoryNormal,
        Reason::DeviceDiskWarning,
        Reason::DeviceDiskCritical,
        Reason::DeviceDiskNormal,
        Reason::DeviceDisconnected,
        Reason::DeviceConnected,
        Reason::ResourceDeleted,
        Reason::DeviceDecommissioned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::DeviceApplicationDegraded => "DeviceApplicationDegraded",
            Reason::DeviceApplicationError => "DeviceApplicationError",
            Reason::DeviceApplicationHealthy => "DeviceApplicationHealthy",
            Reason::DeviceCPUWarning => "DeviceCPUWarning",
            Reason::DeviceCPUCritical => "DeviceCPUCritical",
            Reason::DeviceCPUNormal => "DeviceCPUNormal",
            Reason::DeviceMemoryWarning => "DeviceMemoryWarning",
            Reason::DeviceMemoryCritical => "DeviceMemoryCritical",
            Reason::DeviceMemoryNormal => "DeviceMemoryNormal",
            Reason::DeviceDiskWarning => "DeviceDiskWarning",
            Reason::DeviceDiskCritical => "DeviceDiskCritical",
            Reason::DeviceDiskNormal => "DeviceDiskNormal",
            Reason::DeviceDisconnected => "DeviceDisconnected",
            Reason::DeviceConnected => "DeviceConnected",
            Reason::ResourceDeleted => "ResourceDeleted",
            Reason::DeviceDecommissioned => "DeviceDecommissioned",
        }
    }

    pub fn parse(s: &str) -> Option<Reason> {
        Reason::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per (key, reason) alert record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertInfo {
    #[serde(rename = "resourceName")]
    pub resource_name: String,
    #[serde(rename = "resourceKind")]
    pub resource_kind: String,
    #[serde(rename = "orgID")]
    pub org_id: String,
    pub reason: Reason,
    pub summary: String,
    #[serde(rename = "startsAt")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "endsAt")]
    pub ends_at: Option<DateTime<Utc>>,
}

impl AlertInfo {
    /// `endsAt == null` iff the alert is active.
    pub fn is_active(&self) -> bool {
        self.ends_at.is_none()
    }
}

/// Mapping `AlertKey -> (Reason -> AlertInfo)`. `BTreeMap` throughout keeps
/// iteration order deterministic, which is what makes checkpoint round-trips
/// and idempotent-replay assertions byte-comparable in tests.
pub type AlertStore = BTreeMap<AlertKey, BTreeMap<Reason, AlertInfo>>;

/// Current format ordinal for the checkpoint envelope.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Durable snapshot of `(alerts, timestamp, version)` used to resume after restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub alerts: AlertStore,
}

impl Checkpoint {
    pub fn empty() -> Self {
        Self { version: CHECKPOINT_VERSION, timestamp: DateTime::<Utc>::UNIX_EPOCH, alerts: AlertStore::new() }
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::empty()
    }
}

/// A raw event as received from the upstream API, prior to validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "creationTimestamp")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub reason: String,
    #[serde(rename = "involvedObject")]
    pub involved_object: InvolvedObject,
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvolvedObject {
    pub kind: String,
    pub name: String,
}

/// A validated event, ready to feed into the state machine.
#[derive(Debug, Clone)]
pub struct ValidatedEvent {
    pub org_id: String,
    pub timestamp: DateTime<Utc>,
    pub reason: Reason,
    pub kind: String,
    pub name: String,
    pub message: String,
}

impl ValidatedEvent {
    pub fn key(&self) -> AlertKey {
        AlertKey::new(&self.org_id, &self.kind, &self.name)
    }
}

/// Validate a raw event. Events with an empty `involvedObject.name`, a
/// missing timestamp, or an unrecognized reason are rejected.
pub fn validate_event(org_id: &str, raw: &RawEvent) -> Option<ValidatedEvent> {
    let timestamp = raw.creation_timestamp?;
    if raw.involved_object.name.is_empty() {
        return None;
    }
    let reason = Reason::parse(&raw.reason)?;
    Some(ValidatedEvent {
        org_id: org_id.to_owned(),
        timestamp,
        reason,
        kind: raw.involved_object.kind.clone(),
        name: raw.involved_object.name.clone(),
        message: raw.message.clone(),
    })
}
