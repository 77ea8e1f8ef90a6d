//! In-memory repository fakes.
//!
//! Deterministic stand-ins for the SQLite store, mirroring its upsert and
//! soft-delete semantics closely enough for service-level tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tutorlane_core::{BookingLinkRepository, ConnectionRepository, EventCacheRepository};
use tutorlane_domain::{
    BookingCalendarLink, CachedCalendarEvent, CalendarConnection, CalendarProviderKind,
    EventStatus, Result, SyncStatus, TimeWindow,
};

/// In-memory `ConnectionRepository`.
#[derive(Default, Clone)]
pub struct InMemoryConnections {
    rows: Arc<Mutex<Vec<CalendarConnection>>>,
}

impl InMemoryConnections {
    pub fn new(rows: Vec<CalendarConnection>) -> Self {
        Self { rows: Arc::new(Mutex::new(rows)) }
    }

    pub fn get(&self, connection_id: &str) -> Option<CalendarConnection> {
        self.rows.lock().unwrap().iter().find(|c| c.id == connection_id).cloned()
    }

    pub fn set_sync_enabled(&self, connection_id: &str, enabled: bool) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|c| c.id == connection_id) {
            row.sync_enabled = enabled;
        }
    }

    pub fn set_status(&self, connection_id: &str, status: SyncStatus) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|c| c.id == connection_id) {
            row.status = status;
        }
    }
}

#[async_trait]
impl ConnectionRepository for InMemoryConnections {
    async fn connections_for_tutor(&self, tutor_id: &str) -> Result<Vec<CalendarConnection>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.tutor_id == tutor_id)
            .cloned()
            .collect())
    }

    async fn store_rotated_tokens(
        &self,
        connection_id: &str,
        access_token_enc: &str,
        expires_at: DateTime<Utc>,
        refresh_token_enc: Option<&str>,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|c| c.id == connection_id) {
            row.access_token_enc = access_token_enc.to_string();
            row.access_token_expires_at = Some(expires_at);
            if let Some(refresh) = refresh_token_enc {
                row.refresh_token_enc = Some(refresh.to_string());
            }
        }
        Ok(())
    }

    async fn record_status(
        &self,
        connection_id: &str,
        status: SyncStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|c| c.id == connection_id) {
            row.status = status;
            row.last_error = error.map(str::to_string);
        }
        Ok(())
    }

    async fn record_synced(&self, connection_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|c| c.id == connection_id) {
            row.last_synced_at = Some(at);
        }
        Ok(())
    }
}

/// In-memory `BookingLinkRepository`.
#[derive(Default, Clone)]
pub struct InMemoryLinks {
    rows: Arc<Mutex<Vec<BookingCalendarLink>>>,
}

impl InMemoryLinks {
    pub fn snapshot(&self) -> Vec<BookingCalendarLink> {
        self.rows.lock().unwrap().clone()
    }

    pub fn is_linked(&self, provider_event_id: &str) -> bool {
        self.rows.lock().unwrap().iter().any(|l| l.provider_event_id == provider_event_id)
    }
}

#[async_trait]
impl BookingLinkRepository for InMemoryLinks {
    async fn links_for_booking(&self, booking_id: &str) -> Result<Vec<BookingCalendarLink>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn insert_link(&self, link: &BookingCalendarLink) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows
            .iter_mut()
            .find(|l| l.booking_id == link.booking_id && l.connection_id == link.connection_id)
        {
            *existing = link.clone();
        } else {
            rows.push(link.clone());
        }
        Ok(())
    }

    async fn remove_link(&self, link_id: &str) -> Result<()> {
        self.rows.lock().unwrap().retain(|l| l.id != link_id);
        Ok(())
    }
}

/// In-memory `EventCacheRepository`.
///
/// Holds a handle to the link store so the legacy-candidate query can
/// exclude linked rows the way the SQL `NOT EXISTS` subquery does.
#[derive(Clone)]
pub struct InMemoryEventCache {
    rows: Arc<Mutex<Vec<CachedCalendarEvent>>>,
    links: InMemoryLinks,
}

impl InMemoryEventCache {
    pub fn new(links: InMemoryLinks) -> Self {
        Self { rows: Arc::new(Mutex::new(Vec::new())), links }
    }

    pub fn with_event(self, event: CachedCalendarEvent) -> Self {
        self.rows.lock().unwrap().push(event);
        self
    }

    pub fn seed(&self, event: CachedCalendarEvent) {
        self.rows.lock().unwrap().push(event);
    }

    pub fn snapshot(&self) -> Vec<CachedCalendarEvent> {
        self.rows.lock().unwrap().clone()
    }
}

fn is_live_match(
    row: &CachedCalendarEvent,
    tutor_id: &str,
    provider: CalendarProviderKind,
    provider_event_id: &str,
) -> bool {
    row.deleted_at.is_none()
        && row.tutor_id == tutor_id
        && row.provider == provider
        && row.provider_event_id == provider_event_id
}

#[async_trait]
impl EventCacheRepository for InMemoryEventCache {
    async fn upsert_events(&self, events: &[CachedCalendarEvent]) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        for event in events {
            if let Some(existing) = rows.iter_mut().find(|r| {
                r.tutor_id == event.tutor_id
                    && r.provider == event.provider
                    && r.provider_event_id == event.provider_event_id
            }) {
                let id = existing.id.clone();
                *existing = event.clone();
                existing.id = id;
                existing.deleted_at = None;
            } else {
                rows.push(event.clone());
            }
        }
        Ok(())
    }

    async fn events_for_account(
        &self,
        tutor_id: &str,
        provider: CalendarProviderKind,
        provider_account: &str,
        range: &TimeWindow,
    ) -> Result<Vec<CachedCalendarEvent>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.deleted_at.is_none()
                    && r.tutor_id == tutor_id
                    && r.provider == provider
                    && r.provider_account == provider_account
                    && r.window().overlaps(range)
            })
            .cloned()
            .collect())
    }

    async fn events_for_tutor(
        &self,
        tutor_id: &str,
        range: &TimeWindow,
    ) -> Result<Vec<CachedCalendarEvent>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.deleted_at.is_none() && r.tutor_id == tutor_id && r.window().overlaps(range)
            })
            .cloned()
            .collect())
    }

    async fn find_event(
        &self,
        tutor_id: &str,
        provider: CalendarProviderKind,
        provider_event_id: &str,
    ) -> Result<Option<CachedCalendarEvent>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| is_live_match(r, tutor_id, provider, provider_event_id))
            .cloned())
    }

    async fn retire_event(
        &self,
        tutor_id: &str,
        provider: CalendarProviderKind,
        provider_event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) =
            rows.iter_mut().find(|r| is_live_match(r, tutor_id, provider, provider_event_id))
        {
            row.status = EventStatus::Cancelled;
            row.deleted_at = Some(at);
        }
        Ok(())
    }

    async fn find_legacy_candidate(
        &self,
        tutor_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        title_prefix: &str,
    ) -> Result<Option<CachedCalendarEvent>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.deleted_at.is_none()
                    && r.tutor_id == tutor_id
                    && r.start == start
                    && r.end == end
                    && r.summary.as_deref().is_some_and(|s| s.starts_with(title_prefix))
                    && !self.links.is_linked(&r.provider_event_id)
            })
            .cloned())
    }

    async fn purge_deleted_older_than(&self, days: i64) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.deleted_at.map(|at| at >= cutoff).unwrap_or(true));
        Ok(before - rows.len())
    }
}
