// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The upstream events API boundary. The API/storage layer itself is an
//! external collaborator (out of scope, §1); this module defines the trait
//! the processor drives it through, a thin `reqwest`-backed implementation
//! of that trait, and an in-memory fake used throughout the test suite.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Reason, ValidatedEvent};

/// An organization (tenant) known to the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// Parameters for one page of an event listing request.
#[derive(Debug, Clone)]
pub struct ListEventsParams {
    pub reasons: Vec<Reason>,
    pub since: Option<DateTime<Utc>>,
    pub limit: u32,
    pub continue_token: Option<String>,
}

impl ListEventsParams {
    pub fn first_page(since: Option<DateTime<Utc>>) -> Self {
        Self { reasons: Reason::ALL.to_vec(), since, limit: 1000, continue_token: None }
    }

    /// Comma-joined `fieldSelector`, e.g. `reason in (DeviceCPUWarning,...),metadata.creationTimestamp>=...`.
    pub fn field_selector(&self) -> String {
        let reasons = self.reasons.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(",");
        let mut selector = format!("reason in ({reasons})");
        if let Some(since) = self.since {
            selector.push_str(&format!(",metadata.creationTimestamp>={}", since.to_rfc3339()));
        }
        selector
    }
}

/// One page of raw events plus an opaque continuation cursor.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<crate::model::RawEvent>,
    pub continue_token: Option<String>,
}

/// Client-side boundary to the upstream events API.
#[async_trait]
pub trait EventsApi: Send + Sync {
    async fn list_organizations(&self) -> anyhow::Result<Vec<Organization>>;
    async fn list_events(&self, org: &str, params: &ListEventsParams) -> anyhow::Result<Page>;
    async fn database_time(&self) -> anyhow::Result<DateTime<Utc>>;
}

/// Drain every page of an org's event listing ascending from `since`,
/// returning validated events in order. The opaque `continue` cursor is
/// never inspected beyond "is it present".
pub async fn list_all_events<A: EventsApi + ?Sized>(
    api: &A,
    org: &str,
    since: Option<DateTime<Utc>>,
) -> anyhow::Result<(Vec<ValidatedEvent>, u64)> {
    let mut params = ListEventsParams::first_page(since);
    let mut validated = Vec::new();
    let mut invalid_count = 0u64;

    loop {
        let page = api.list_events(org, &params).await?;
        for raw in &page.items {
            match crate::model::validate_event(org, raw) {
                Some(event) => validated.push(event),
                None => invalid_count += 1,
            }
        }
        match page.continue_token {
            Some(token) => params.continue_token = Some(token),
            None => break,
        }
    }

    Ok((validated, invalid_count))
}

/// Real HTTP-backed implementation of [`EventsApi`], calling the documented
/// REST contract of the (out-of-scope) control-plane API.
pub struct HttpEventsApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpEventsApi {
    pub fn new(base_url: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(std::time::Duration::from_secs(10)).build()?;
        Ok(Self { base_url, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl EventsApi for HttpEventsApi {
    async fn list_organizations(&self) -> anyhow::Result<Vec<Organization>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "Items")]
            items: Vec<Organization>,
        }
        let resp: Response =
            self.client.get(self.url("/api/v1/organizations")).send().await?.error_for_status()?.json().await?;
        Ok(resp.items)
    }

    async fn list_events(&self, org: &str, params: &ListEventsParams) -> anyhow::Result<Page> {
        #[derive(Deserialize)]
        struct Metadata {
            #[serde(rename = "Continue")]
            continue_token: Option<String>,
        }
        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "Items")]
            items: Vec<crate::model::RawEvent>,
            #[serde(rename = "Metadata")]
            metadata: Metadata,
        }

        let mut req = self
            .client
            .get(self.url(&format!("/api/v1/organizations/{org}/events")))
            .query(&[("order", "asc"), ("limit", &params.limit.to_string()), ("fieldSelector", &params.field_selector())]);
        if let Some(token) = &params.continue_token {
            req = req.query(&[("continue", token)]);
        }

        let resp: Response = req.send().await?.error_for_status()?.json().await?;
        Ok(Page { items: resp.items, continue_token: resp.metadata.continue_token })
    }

    async fn database_time(&self) -> anyhow::Result<DateTime<Utc>> {
        #[derive(Deserialize)]
        struct Response {
            timestamp: DateTime<Utc>,
        }
        let resp: Response =
            self.client.get(self.url("/api/v1/database-time")).send().await?.error_for_status()?.json().await?;
        Ok(resp.timestamp)
    }
}

/// Lock a `Mutex`, recovering the guard on poison instead of panicking. The
/// fakes below are only ever touched from single-threaded test bodies, so a
/// poisoned lock just means a previous assertion in the same test failed.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory fake of the upstream API, used by unit and integration tests.
pub struct FakeEventsApi {
    organizations: Vec<Organization>,
    events: Mutex<std::collections::HashMap<String, VecDeque<crate::model::RawEvent>>>,
    page_size: usize,
    database_time: Mutex<DateTime<Utc>>,
    fail_orgs: Mutex<std::collections::HashSet<String>>,
}

impl FakeEventsApi {
    pub fn new(organizations: Vec<Organization>, database_time: DateTime<Utc>) -> Self {
        Self {
            organizations,
            events: Mutex::new(std::collections::HashMap::new()),
            page_size: 2,
            database_time: Mutex::new(database_time),
            fail_orgs: Mutex::new(std::collections::HashSet::new()),
        }
    }

    pub fn push_event(&self, org: &str, event: crate::model::RawEvent) {
        lock(&self.events).entry(org.to_owned()).or_default().push_back(event);
    }

    pub fn set_database_time(&self, ts: DateTime<Utc>) {
        *lock(&self.database_time) = ts;
    }

    /// Make `list_events` fail for this org on its next call (consumed once).
    pub fn fail_next_listing_for(&self, org: &str) {
        lock(&self.fail_orgs).insert(org.to_owned());
    }
}

#[async_trait]
impl EventsApi for FakeEventsApi {
    async fn list_organizations(&self) -> anyhow::Result<Vec<Organization>> {
        Ok(self.organizations.clone())
    }

    async fn list_events(&self, org: &str, params: &ListEventsParams) -> anyhow::Result<Page> {
        if lock(&self.fail_orgs).remove(org) {
            anyhow::bail!("simulated listing failure for org {org}");
        }

        let mut events = lock(&self.events);
        let queue = events.entry(org.to_owned()).or_default();

        // First page: apply the `since` filter. Subsequent pages just drain
        // the remaining queue, mirroring a cursor over an already-filtered set.
        if params.continue_token.is_none() {
            if let Some(since) = params.since {
                queue.retain(|raw| raw.creation_timestamp.map(|t| t >= since).unwrap_or(true));
            }
        }

        let take = self.page_size.min(queue.len());
        let items: Vec<_> = queue.drain(..take).collect();
        let continue_token = if queue.is_empty() { None } else { Some("more".to_owned()) };
        Ok(Page { items, continue_token })
    }

    async fn database_time(&self) -> anyhow::Result<DateTime<Utc>> {
        Ok(*lock(&self.database_time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InvolvedObject;

    fn raw_event(reason: &str, ts: DateTime<Utc>) -> crate::model::RawEvent {
        crate::model::RawEvent {
            creation_timestamp: Some(ts),
            reason: reason.to_owned(),
            involved_object: InvolvedObject { kind: "Device".into(), name: "edge-01".into() },
            event_type: "Warning".into(),
            message: "synthetic".into(),
        }
    }

    #[tokio::test]
    async fn list_all_events_drains_every_page() -> anyhow::Result<()> {
        let api = FakeEventsApi::new(vec![], Utc::now());
        let base = Utc::now();
        for i in 0..5 {
            api.push_event("acme", raw_event("DeviceCPUWarning", base + chrono::Duration::seconds(i)));
        }

        let (events, invalid) = list_all_events(&api, "acme", None).await?;
        assert_eq!(events.len(), 5);
        assert_eq!(invalid, 0);
        Ok(())
    }

    #[tokio::test]
    async fn list_all_events_counts_invalid_without_aborting() -> anyhow::Result<()> {
        let api = FakeEventsApi::new(vec![], Utc::now());
        let base = Utc::now();
        api.push_event("acme", raw_event("DeviceCPUWarning", base));
        api.push_event(
            "acme",
            crate::model::RawEvent {
                creation_timestamp: None,
                reason: "DeviceCPUWarning".into(),
                involved_object: InvolvedObject { kind: "Device".into(), name: "edge-01".into() },
                event_type: "Warning".into(),
                message: "missing ts".into(),
            },
        );

        let (events, invalid) = list_all_events(&api, "acme", None).await?;
        assert_eq!(events.len(), 1);
        assert_eq!(invalid, 1);
        Ok(())
    }

    #[tokio::test]
    async fn list_all_events_applies_since_filter() -> anyhow::Result<()> {
        let api = FakeEventsApi::new(vec![], Utc::now());
        let base = Utc::now();
        api.push_event("acme", raw_event("DeviceCPUWarning", base));
        api.push_event("acme", raw_event("DeviceCPUWarning", base + chrono::Duration::seconds(10)));

        let (events, _) = list_all_events(&api, "acme", Some(base + chrono::Duration::seconds(5))).await?;
        assert_eq!(events.len(), 1);
        Ok(())
    }
}
