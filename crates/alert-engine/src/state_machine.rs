// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Applies a single validated event to the alert store. Infallible and pure:
//! malformed events are filtered upstream by `model::validate_event`.

use crate::model::{AlertInfo, AlertStore, ValidatedEvent};
use crate::reasons::{classify, Classification};

/// Created/resolved counts produced by applying one event, folded into the
/// processor's per-cycle metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    pub created: u32,
    pub resolved: u32,
}

impl Outcome {
    fn merge(&mut self, other: Outcome) {
        self.created += other.created;
        self.resolved += other.resolved;
    }
}

/// Resolve every currently-active alert at `key` by setting `endsAt = event.timestamp`.
fn resolve_all(store: &mut AlertStore, event: &ValidatedEvent) -> Outcome {
    let mut outcome = Outcome::default();
    if let Some(reasons) = store.get_mut(&event.key()) {
        for info in reasons.values_mut() {
            if info.is_active() {
                info.ends_at = Some(event.timestamp);
                outcome.resolved += 1;
            }
        }
    }
    outcome
}

/// Resolve the active alert for each member of `group` at `key`, if any.
fn clear_group(store: &mut AlertStore, event: &ValidatedEvent, group: &[crate::model::Reason]) -> Outcome {
    let mut outcome = Outcome::default();
    if let Some(reasons) = store.get_mut(&event.key()) {
        for member in group {
            if let Some(info) = reasons.get_mut(member) {
                if info.is_active() {
                    info.ends_at = Some(event.timestamp);
                    outcome.resolved += 1;
                }
            }
        }
    }
    outcome
}

/// Resolve every other active member of `group`, then upsert `(key, event.reason)`.
fn set_alert(store: &mut AlertStore, event: &ValidatedEvent, group: &[crate::model::Reason]) -> Outcome {
    let mut outcome = Outcome::default();
    let reasons = store.entry(event.key()).or_default();

    for member in group {
        if *member == event.reason {
            continue;
        }
        if let Some(info) = reasons.get_mut(member) {
            if info.is_active() {
                info.ends_at = Some(event.timestamp);
                outcome.resolved += 1;
            }
        }
    }

    match reasons.get_mut(&event.reason) {
        Some(existing) if existing.is_active() && existing.starts_at == event.timestamp => {
            // Idempotent replay of the identical (key, reason, timestamp) — no-op.
        }
        Some(existing) => {
            let was_inactive = !existing.is_active();
            *existing = AlertInfo {
                resource_name: event.name.clone(),
                resource_kind: event.kind.clone(),
                org_id: event.org_id.clone(),
                reason: event.reason,
                summary: event.message.clone(),
                starts_at: event.timestamp,
                ends_at: None,
            };
            if was_inactive {
                outcome.created += 1;
            }
        }
        None => {
            reasons.insert(
                event.reason,
                AlertInfo {
                    resource_name: event.name.clone(),
                    resource_kind: event.kind.clone(),
                    org_id: event.org_id.clone(),
                    reason: event.reason,
                    summary: event.message.clone(),
                    starts_at: event.timestamp,
                    ends_at: None,
                },
            );
            outcome.created += 1;
        }
    }

    outcome
}

/// Apply one validated event to the store, returning the created/resolved
/// transition counts it produced.
pub fn apply_event(store: &mut AlertStore, event: &ValidatedEvent) -> Outcome {
    let mut outcome = Outcome::default();
    match classify(event.reason) {
        Classification::Terminal => outcome.merge(resolve_all(store, event)),
        Classification::ClearGroup { group } => outcome.merge(clear_group(store, event, group)),
        Classification::SetAlert { group } => outcome.merge(set_alert(store, event, group)),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertKey, Reason};
    use chrono::{Duration, Utc};

    fn event(reason: Reason, ts: chrono::DateTime<Utc>) -> ValidatedEvent {
        ValidatedEvent {
            org_id: "acme".into(),
            timestamp: ts,
            reason,
            kind: "Device".into(),
            name: "edge-01".into(),
            message: format!("{reason}"),
        }
    }

    fn active_reasons(store: &AlertStore, key: &AlertKey) -> Vec<Reason> {
        store
            .get(key)
            .map(|reasons| reasons.values().filter(|i| i.is_active()).map(|i| i.reason).collect())
            .unwrap_or_default()
    }

    // Scenario 1: set then resolve CPU warning.
    #[test]
    fn set_then_resolve_cpu_warning() {
        let mut store = AlertStore::new();
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(5);
        let key = AlertKey::new("acme", "Device", "edge-01");

        let o1 = apply_event(&mut store, &event(Reason::DeviceCPUWarning, t1));
        let o2 = apply_event(&mut store, &event(Reason::DeviceCPUNormal, t2));

        assert_eq!(o1, Outcome { created: 1, resolved: 0 });
        assert_eq!(o2, Outcome { created: 0, resolved: 1 });
        assert!(active_reasons(&store, &key).is_empty());
        assert_eq!(store[&key][&Reason::DeviceCPUWarning].ends_at, Some(t2));
    }

    // Scenario 2: severity escalation is mutually exclusive.
    #[test]
    fn severity_escalation_is_mutually_exclusive() {
        let mut store = AlertStore::new();
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(5);
        let key = AlertKey::new("acme", "Device", "edge-01");

        apply_event(&mut store, &event(Reason::DeviceCPUWarning, t1));
        apply_event(&mut store, &event(Reason::DeviceCPUCritical, t2));

        assert_eq!(store[&key][&Reason::DeviceCPUWarning].ends_at, Some(t2));
        let critical = &store[&key][&Reason::DeviceCPUCritical];
        assert!(critical.is_active());
        assert_eq!(critical.starts_at, t2);
        assert_eq!(active_reasons(&store, &key), vec![Reason::DeviceCPUCritical]);
    }

    // Scenario 3: terminal clears all active alerts at the key.
    #[test]
    fn terminal_reason_clears_all_active_alerts() {
        let mut store = AlertStore::new();
        let t1 = Utc::now();
        let t2 = t1 + Duration::seconds(1);
        let t3 = t1 + Duration::seconds(10);
        let key = AlertKey::new("acme", "Device", "edge-01");

        apply_event(&mut store, &event(Reason::DeviceMemoryWarning, t1));
        apply_event(&mut store, &event(Reason::DeviceDiskCritical, t2));
        let outcome = apply_event(&mut store, &event(Reason::ResourceDeleted, t3));

        assert_eq!(outcome, Outcome { created: 0, resolved: 2 });
        assert_eq!(store[&key][&Reason::DeviceMemoryWarning].ends_at, Some(t3));
        assert_eq!(store[&key][&Reason::DeviceDiskCritical].ends_at, Some(t3));
    }

    // Scenario 4: disconnect is independent of other groups.
    #[test]
    fn disconnect_is_independent_of_other_groups() {
        let mut store = AlertStore::new();
        let t1 = Utc::now();
        let t4 = t1 + Duration::seconds(1);
        let t5 = t1 + Duration::seconds(2);
        let key = AlertKey::new("acme", "Device", "edge-01");

        apply_event(&mut store, &event(Reason::DeviceCPUCritical, t1));
        apply_event(&mut store, &event(Reason::DeviceDisconnected, t4));

        let mut active = active_reasons(&store, &key);
        active.sort_by_key(|r| r.as_str());
        assert_eq!(active, vec![Reason::DeviceCPUCritical, Reason::DeviceDisconnected]);

        apply_event(&mut store, &event(Reason::DeviceConnected, t5));
        assert_eq!(store[&key][&Reason::DeviceDisconnected].ends_at, Some(t5));
        assert!(store[&key][&Reason::DeviceCPUCritical].is_active());
    }

    // Scenario 6: idempotent replay of the identical event stream is a no-op.
    #[test]
    fn idempotent_replay_of_identical_timestamp_is_noop() {
        let mut store = AlertStore::new();
        let t1 = Utc::now();

        let first = apply_event(&mut store, &event(Reason::DeviceCPUWarning, t1));
        let replay = apply_event(&mut store, &event(Reason::DeviceCPUWarning, t1));

        assert_eq!(first, Outcome { created: 1, resolved: 0 });
        assert_eq!(replay, Outcome::default());
    }

    #[test]
    fn at_most_one_active_alert_per_group_invariant_holds() {
        let mut store = AlertStore::new();
        let base = Utc::now();
        let key = AlertKey::new("acme", "Device", "edge-01");

        for (i, reason) in
            [Reason::DeviceCPUWarning, Reason::DeviceCPUCritical, Reason::DeviceCPUWarning].into_iter().enumerate()
        {
            apply_event(&mut store, &event(reason, base + Duration::seconds(i as i64)));
        }

        let active_cpu: Vec<_> = active_reasons(&store, &key)
            .into_iter()
            .filter(|r| {
                matches!(r, Reason::DeviceCPUWarning | Reason::DeviceCPUCritical)
            })
            .collect();
        assert_eq!(active_cpu.len(), 1);
    }
}
