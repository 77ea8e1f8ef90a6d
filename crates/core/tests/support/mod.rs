//! Shared fixtures for calendar engine tests: in-memory repositories,
//! scripted providers, and a pre-wired engine harness.
#![allow(dead_code)]

pub mod providers;
pub mod stores;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tutorlane_core::{BusyWindowAggregator, CalendarEngine, EventMirror, TokenManager};
use tutorlane_domain::{
    BookingEventParams, CachedCalendarEvent, CalendarConnection, CalendarProviderKind,
    EventStatus, ProviderEvent, SyncStatus,
};
use uuid::Uuid;

use self::providers::{PlainTextCipher, ScriptedExchanger, ScriptedProvider, StaticDirectory};
use self::stores::{InMemoryConnections, InMemoryEventCache, InMemoryLinks};

pub fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).single().unwrap()
}

/// A healthy, sync-enabled connection with a token valid for another hour.
pub fn connection(
    id: &str,
    tutor_id: &str,
    provider: CalendarProviderKind,
    account: &str,
) -> CalendarConnection {
    CalendarConnection {
        id: id.to_string(),
        tutor_id: tutor_id.to_string(),
        provider,
        provider_account: account.to_string(),
        access_token_enc: format!("enc:access-{id}"),
        refresh_token_enc: Some(format!("enc:refresh-{id}")),
        access_token_expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        status: SyncStatus::Healthy,
        sync_enabled: true,
        last_synced_at: None,
        last_error: None,
    }
}

pub fn provider_event(
    event_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    summary: &str,
) -> ProviderEvent {
    ProviderEvent {
        event_id: event_id.to_string(),
        calendar_id: "primary".to_string(),
        start,
        end,
        summary: Some(summary.to_string()),
        status: EventStatus::Confirmed,
        recurrence_master_id: None,
        is_all_day: false,
    }
}

pub fn cached_event(
    tutor_id: &str,
    provider: CalendarProviderKind,
    account: &str,
    provider_event_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    summary: &str,
    last_seen_at: DateTime<Utc>,
) -> CachedCalendarEvent {
    CachedCalendarEvent {
        id: Uuid::now_v7().to_string(),
        tutor_id: tutor_id.to_string(),
        provider,
        provider_account: account.to_string(),
        provider_event_id: provider_event_id.to_string(),
        calendar_id: "primary".to_string(),
        start,
        end,
        summary: Some(summary.to_string()),
        status: EventStatus::Confirmed,
        recurrence_master_id: None,
        is_all_day: false,
        deleted_at: None,
        last_seen_at,
    }
}

pub fn booking(
    booking_id: &str,
    tutor_id: &str,
    title: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> BookingEventParams {
    BookingEventParams {
        booking_id: booking_id.to_string(),
        tutor_id: tutor_id.to_string(),
        title: title.to_string(),
        description: Some("Tutorlane lesson".to_string()),
        start,
        end,
        timezone: "Europe/Berlin".to_string(),
        attendee_email: Some("student@example.com".to_string()),
        previous_start: None,
        previous_end: None,
    }
}

/// Fully wired engine over in-memory fakes.
pub struct TestEngine {
    pub connections: InMemoryConnections,
    pub cache: InMemoryEventCache,
    pub links: InMemoryLinks,
    pub google: Arc<ScriptedProvider>,
    pub outlook: Arc<ScriptedProvider>,
    pub exchanger: Arc<ScriptedExchanger>,
    pub aggregator: Arc<BusyWindowAggregator>,
    pub mirror: Arc<EventMirror>,
    pub engine: CalendarEngine,
}

pub fn engine_with(rows: Vec<CalendarConnection>) -> TestEngine {
    let connections = InMemoryConnections::new(rows);
    let links = InMemoryLinks::default();
    let cache = InMemoryEventCache::new(links.clone());
    let google = Arc::new(ScriptedProvider::default());
    let outlook = Arc::new(ScriptedProvider::default());
    let exchanger = Arc::new(ScriptedExchanger::default());

    let directory = Arc::new(
        StaticDirectory::new()
            .with(CalendarProviderKind::Google, google.clone())
            .with(CalendarProviderKind::Outlook, outlook.clone()),
    );
    let tokens = Arc::new(TokenManager::new(
        Arc::new(connections.clone()),
        exchanger.clone(),
        Arc::new(PlainTextCipher),
    ));
    let aggregator = Arc::new(BusyWindowAggregator::new(
        Arc::new(connections.clone()),
        Arc::new(cache.clone()),
        directory.clone(),
        tokens.clone(),
    ));
    let mirror = Arc::new(EventMirror::new(
        Arc::new(connections.clone()),
        Arc::new(cache.clone()),
        Arc::new(links.clone()),
        directory,
        tokens,
    ));
    let engine = CalendarEngine::new(aggregator.clone(), mirror.clone());

    TestEngine { connections, cache, links, google, outlook, exchanger, aggregator, mirror, engine }
}
