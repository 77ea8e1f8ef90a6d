//! Calendar synchronization services.
//!
//! The services in this module compose through the ports in
//! [`ports`]: the token manager keeps connection credentials fresh, the
//! aggregator answers busy-window queries with live-then-cache semantics,
//! and the mirror propagates booking transitions to provider calendars.

use chrono::{DateTime, Utc};
use tutorlane_domain::{CachedCalendarEvent, CalendarConnection, ProviderEvent};
use uuid::Uuid;

pub mod availability;
pub mod engine;
pub mod mirror;
pub mod ports;
pub mod token;

/// Build a cache row from a normalized provider event observed on
/// `connection`.
pub(crate) fn cached_event_from_provider(
    connection: &CalendarConnection,
    event: &ProviderEvent,
    seen_at: DateTime<Utc>,
) -> CachedCalendarEvent {
    CachedCalendarEvent {
        id: Uuid::now_v7().to_string(),
        tutor_id: connection.tutor_id.clone(),
        provider: connection.provider,
        provider_account: connection.provider_account.clone(),
        provider_event_id: event.event_id.clone(),
        calendar_id: event.calendar_id.clone(),
        start: event.start,
        end: event.end,
        summary: event.summary.clone(),
        status: event.status,
        recurrence_master_id: event.recurrence_master_id.clone(),
        is_all_day: event.is_all_day,
        deleted_at: None,
        last_seen_at: seen_at,
    }
}
