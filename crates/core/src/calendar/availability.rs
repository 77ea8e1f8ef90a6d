//! Busy-window aggregation across a tutor's calendar connections.
//!
//! Fans out over every syncable connection concurrently, asking each
//! provider for its events in the requested range. A connection whose live
//! call cannot be made (or fails, or times out) falls back to the cached
//! copy of its last successful observation; per-connection failures never
//! abort the aggregation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, error, instrument, warn};
use tutorlane_domain::constants::{CACHE_STALE_AFTER_SECS, DEFAULT_PROVIDER_TIMEOUT_SECS};
use tutorlane_domain::{
    BusyWindowReport, CachedCalendarEvent, CalendarConnection, CalendarEventView,
    CalendarProviderKind, EventStatus, Result, SyncStatus, TimeWindow, TutorlaneError,
};

use super::cached_event_from_provider;
use super::ports::{ConnectionRepository, EventCacheRepository, ProviderDirectory};
use super::token::TokenManager;

/// Events gathered for one connection, with freshness signals.
struct ConnectionSlice {
    provider: CalendarProviderKind,
    provider_account: String,
    events: Vec<CachedCalendarEvent>,
    /// Served from a cache whose watermark is older than the threshold.
    stale: bool,
    /// Served from cache because the live call failed.
    unverified: bool,
}

/// Busy-window aggregator.
pub struct BusyWindowAggregator {
    connections: Arc<dyn ConnectionRepository>,
    cache: Arc<dyn EventCacheRepository>,
    providers: Arc<dyn ProviderDirectory>,
    tokens: Arc<TokenManager>,
    provider_timeout: Duration,
}

impl BusyWindowAggregator {
    pub fn new(
        connections: Arc<dyn ConnectionRepository>,
        cache: Arc<dyn EventCacheRepository>,
        providers: Arc<dyn ProviderDirectory>,
        tokens: Arc<TokenManager>,
    ) -> Self {
        Self {
            connections,
            cache,
            providers,
            tokens,
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }

    /// Override the per-connection timeout applied to live provider calls.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Busy intervals for the tutor over `days` starting at `start`, sorted
    /// ascending by start time. Overlaps are not coalesced; consumers only
    /// need containment checks.
    pub async fn busy_windows(
        &self,
        tutor_id: &str,
        start: DateTime<Utc>,
        days: i64,
    ) -> Result<Vec<TimeWindow>> {
        let slices = self.collect(tutor_id, &range_for(start, days)).await?;
        let mut windows: Vec<TimeWindow> = slices
            .iter()
            .flat_map(|slice| slice.events.iter())
            .filter(|event| event.status != EventStatus::Cancelled)
            .map(CachedCalendarEvent::window)
            .collect();
        windows.sort_by_key(|window| (window.start, window.end));
        Ok(windows)
    }

    /// Busy intervals plus per-provider freshness flags for the sync-health
    /// UI.
    pub async fn busy_windows_with_status(
        &self,
        tutor_id: &str,
        start: DateTime<Utc>,
        days: i64,
    ) -> Result<BusyWindowReport> {
        let slices = self.collect(tutor_id, &range_for(start, days)).await?;

        let mut report = BusyWindowReport::default();
        for slice in &slices {
            if slice.stale && !report.stale_providers.contains(&slice.provider) {
                report.stale_providers.push(slice.provider);
            }
            if slice.unverified && !report.unverified_providers.contains(&slice.provider) {
                report.unverified_providers.push(slice.provider);
            }
        }
        report.windows = slices
            .iter()
            .flat_map(|slice| slice.events.iter())
            .filter(|event| event.status != EventStatus::Cancelled)
            .map(CachedCalendarEvent::window)
            .collect();
        report.windows.sort_by_key(|window| (window.start, window.end));
        Ok(report)
    }

    /// Event rows for the tutor's unified calendar view, sorted ascending.
    pub async fn events_with_details(
        &self,
        tutor_id: &str,
        start: DateTime<Utc>,
        days: i64,
    ) -> Result<Vec<CalendarEventView>> {
        let slices = self.collect(tutor_id, &range_for(start, days)).await?;
        let mut views: Vec<CalendarEventView> = slices
            .iter()
            .flat_map(|slice| {
                let source =
                    format!("{} ({})", slice.provider.label(), slice.provider_account);
                slice
                    .events
                    .iter()
                    .filter(|event| event.status != EventStatus::Cancelled)
                    .map(move |event| CalendarEventView {
                        title: event.summary.clone().unwrap_or_else(|| "Busy".to_string()),
                        start: event.start,
                        end: event.end,
                        is_all_day: event.is_all_day,
                        source: source.clone(),
                    })
            })
            .collect();
        views.sort_by_key(|view| view.start);
        Ok(views)
    }

    /// Gather events for every syncable connection concurrently. A tutor
    /// with zero connections yields an empty list.
    #[instrument(skip(self), fields(tutor_id))]
    async fn collect(&self, tutor_id: &str, range: &TimeWindow) -> Result<Vec<ConnectionSlice>> {
        let connections = self.connections.connections_for_tutor(tutor_id).await?;
        let tasks = connections
            .iter()
            .filter(|connection| connection.is_live_queryable())
            .map(|connection| self.collect_connection(connection, range));
        Ok(join_all(tasks).await)
    }

    async fn collect_connection(
        &self,
        connection: &CalendarConnection,
        range: &TimeWindow,
    ) -> ConnectionSlice {
        let token = match self.tokens.ensure_fresh_access_token(connection).await {
            Ok(Some(token)) => Some(token),
            // Credential trouble was already recorded by the token manager.
            Ok(None) => None,
            Err(err) => {
                error!(
                    connection_id = %connection.id,
                    error = %err,
                    "token manager failed; serving cached busy data"
                );
                None
            }
        };

        let Some(token) = token else {
            return self.cached_fallback(connection, range).await;
        };

        match self.fetch_live(connection, &token, range).await {
            Ok(events) => ConnectionSlice {
                provider: connection.provider,
                provider_account: connection.provider_account.clone(),
                events,
                stale: false,
                unverified: false,
            },
            Err(err) => {
                warn!(
                    connection_id = %connection.id,
                    provider = %connection.provider,
                    error = %err,
                    "live listing failed; serving cached busy data"
                );
                if let Err(persist_err) = self
                    .connections
                    .record_status(&connection.id, SyncStatus::Error, Some(&err.to_string()))
                    .await
                {
                    error!(connection_id = %connection.id, error = %persist_err, "failed to record sync error");
                }
                self.cached_fallback(connection, range).await
            }
        }
    }

    /// Live listing for one connection: provider call under timeout, then
    /// cache upsert and sync bookkeeping.
    async fn fetch_live(
        &self,
        connection: &CalendarConnection,
        access_token: &str,
        range: &TimeWindow,
    ) -> Result<Vec<CachedCalendarEvent>> {
        let adapter = self.providers.adapter_for(connection.provider).ok_or_else(|| {
            TutorlaneError::Config(format!(
                "no adapter registered for provider {}",
                connection.provider
            ))
        })?;

        let events =
            tokio::time::timeout(self.provider_timeout, adapter.list_busy_events(access_token, range))
                .await
                .map_err(|_| {
                    TutorlaneError::Network(format!(
                        "{} listing timed out after {:?}",
                        connection.provider, self.provider_timeout
                    ))
                })??;

        let now = Utc::now();
        let rows: Vec<CachedCalendarEvent> = events
            .iter()
            .map(|event| cached_event_from_provider(connection, event, now))
            .collect();

        // Persistence failures degrade the cache, not the live answer.
        if let Err(err) = self.cache.upsert_events(&rows).await {
            error!(connection_id = %connection.id, error = %err, "failed to persist fetched events");
        }

        if !rows.is_empty() {
            if let Err(err) = self.connections.record_synced(&connection.id, now).await {
                error!(connection_id = %connection.id, error = %err, "failed to record sync time");
            }
            if let Err(err) =
                self.connections.record_status(&connection.id, SyncStatus::Healthy, None).await
            {
                error!(connection_id = %connection.id, error = %err, "failed to record sync status");
            }
        }

        debug!(
            connection_id = %connection.id,
            provider = %connection.provider,
            count = rows.len(),
            "live listing succeeded"
        );

        Ok(rows)
    }

    async fn cached_fallback(
        &self,
        connection: &CalendarConnection,
        range: &TimeWindow,
    ) -> ConnectionSlice {
        let events = match self
            .cache
            .events_for_account(
                &connection.tutor_id,
                connection.provider,
                &connection.provider_account,
                range,
            )
            .await
        {
            Ok(events) => events,
            Err(err) => {
                error!(
                    connection_id = %connection.id,
                    error = %err,
                    "cache read failed; connection contributes no busy data"
                );
                Vec::new()
            }
        };

        let stale = events
            .iter()
            .map(|event| event.last_seen_at)
            .max()
            .map(|seen| (Utc::now() - seen).num_seconds() > CACHE_STALE_AFTER_SECS)
            .unwrap_or(false);

        ConnectionSlice {
            provider: connection.provider,
            provider_account: connection.provider_account.clone(),
            events,
            stale,
            unverified: true,
        }
    }
}

fn range_for(start: DateTime<Utc>, days: i64) -> TimeWindow {
    TimeWindow::new(start, start + chrono::Duration::days(days))
}
