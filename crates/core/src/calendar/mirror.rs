//! Provider-event mirroring for booking lifecycle transitions.
//!
//! Creates, updates, and deletes the provider events representing a booking
//! on every connected calendar. Mirroring is best-effort and self-healing:
//! the platform booking record stays the source of truth, link rows make
//! repeat operations idempotent, and a heuristic matcher re-attaches events
//! that were mirrored before link rows existed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use tutorlane_domain::constants::DEFAULT_PROVIDER_TIMEOUT_SECS;
use tutorlane_domain::{
    BookingCalendarLink, BookingEventParams, CalendarConnection, DeleteOutcome, EventPayload,
    ProviderEventRef, Result, TutorlaneError, UpdateOutcome,
};
use uuid::Uuid;

use super::cached_event_from_provider;
use super::ports::{
    BookingLinkRepository, CalendarProviderApi, ConnectionRepository, EventCacheRepository,
    ProviderDirectory,
};
use super::token::TokenManager;

/// Event mirror service.
pub struct EventMirror {
    connections: Arc<dyn ConnectionRepository>,
    cache: Arc<dyn EventCacheRepository>,
    links: Arc<dyn BookingLinkRepository>,
    providers: Arc<dyn ProviderDirectory>,
    tokens: Arc<TokenManager>,
    provider_timeout: Duration,
}

impl EventMirror {
    pub fn new(
        connections: Arc<dyn ConnectionRepository>,
        cache: Arc<dyn EventCacheRepository>,
        links: Arc<dyn BookingLinkRepository>,
        providers: Arc<dyn ProviderDirectory>,
        tokens: Arc<TokenManager>,
    ) -> Self {
        Self {
            connections,
            cache,
            links,
            providers,
            tokens,
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }

    /// Override the timeout applied to provider mutation calls.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Mirror a newly confirmed booking onto every usable connection.
    ///
    /// Idempotent: when a link already exists and `force_create` is unset
    /// the call is a no-op. Before creating, an unlinked cached event with
    /// identical times and a matching title prefix is re-linked instead of
    /// duplicated. Zero connected calendars is a legitimate state and counts
    /// as success; failure is reserved for "every provider attempt failed".
    #[instrument(skip(self, params), fields(booking_id = %params.booking_id, tutor_id = %params.tutor_id))]
    pub async fn mirror_booking_created(
        &self,
        params: &BookingEventParams,
        force_create: bool,
    ) -> Result<()> {
        let existing = self.links.links_for_booking(&params.booking_id).await?;
        if !existing.is_empty() && !force_create {
            debug!("booking already linked to provider events");
            return Ok(());
        }

        let connections = self.connections.connections_for_tutor(&params.tutor_id).await?;
        let usable: Vec<CalendarConnection> =
            connections.into_iter().filter(CalendarConnection::is_live_queryable).collect();

        if !force_create
            && self.relink_legacy(params, params.start, params.end, &usable).await?
        {
            return Ok(());
        }

        if usable.is_empty() {
            debug!("tutor has no connected calendars; nothing to mirror");
            return Ok(());
        }

        let mut mirrored = 0usize;
        let mut last_error: Option<TutorlaneError> = None;
        for connection in &usable {
            match self.create_on_connection(connection, params).await {
                Ok(()) => mirrored += 1,
                Err(err) => {
                    warn!(
                        connection_id = %connection.id,
                        provider = %connection.provider,
                        error = %err,
                        "failed to mirror booking onto provider calendar"
                    );
                    last_error = Some(err);
                }
            }
        }

        if mirrored == 0 {
            if let Some(err) = last_error {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Propagate a reschedule to every linked provider event.
    ///
    /// Falls back to the legacy matcher (using the pre-reschedule times)
    /// when no link rows exist. A provider answering `NotFound` is
    /// reconciled locally - and re-created when `create_if_missing` is set -
    /// never treated as a hard failure.
    #[instrument(skip(self, params), fields(booking_id = %params.booking_id, tutor_id = %params.tutor_id))]
    pub async fn mirror_booking_updated(
        &self,
        params: &BookingEventParams,
        create_if_missing: bool,
    ) -> Result<()> {
        let mut targets = self.links.links_for_booking(&params.booking_id).await?;

        if targets.is_empty() {
            if let (Some(prev_start), Some(prev_end)) =
                (params.previous_start, params.previous_end)
            {
                let connections =
                    self.connections.connections_for_tutor(&params.tutor_id).await?;
                if let Some(link) =
                    self.legacy_link(params, prev_start, prev_end, &connections).await?
                {
                    self.links.insert_link(&link).await?;
                    targets.push(link);
                }
            }
        }

        if targets.is_empty() {
            if create_if_missing {
                return self.mirror_booking_created(params, false).await;
            }
            debug!("booking has no mirrored events to update");
            return Ok(());
        }

        let connections = self.connections.connections_for_tutor(&params.tutor_id).await?;
        let mut attempted = 0usize;
        let mut updated = 0usize;
        let mut last_error: Option<TutorlaneError> = None;

        for link in &targets {
            let connection = connections.iter().find(|c| c.id == link.connection_id);
            let Some(connection) = connection.filter(|c| c.is_live_queryable()) else {
                // Connection disabled or gone since the event was mirrored:
                // silently drop the mirrored event locally.
                debug!(
                    connection_id = %link.connection_id,
                    "connection no longer syncable; cancelling mirrored event locally"
                );
                self.retire_link(link).await;
                continue;
            };

            attempted += 1;
            match self.update_on_connection(connection, link, params, create_if_missing).await {
                Ok(()) => updated += 1,
                Err(err) => {
                    warn!(
                        connection_id = %connection.id,
                        provider = %connection.provider,
                        error = %err,
                        "failed to update mirrored event"
                    );
                    last_error = Some(err);
                }
            }
        }

        if attempted > 0 && updated == 0 {
            if let Some(err) = last_error {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Delete (or locally cancel) every provider event mirroring a cancelled
    /// booking. A provider answering `NotFound` is already satisfied.
    #[instrument(skip(self, params), fields(booking_id = %params.booking_id, tutor_id = %params.tutor_id))]
    pub async fn mirror_booking_cancelled(&self, params: &BookingEventParams) -> Result<()> {
        let mut targets = self.links.links_for_booking(&params.booking_id).await?;

        if targets.is_empty() {
            let start = params.previous_start.unwrap_or(params.start);
            let end = params.previous_end.unwrap_or(params.end);
            let connections = self.connections.connections_for_tutor(&params.tutor_id).await?;
            if let Some(link) = self.legacy_link(params, start, end, &connections).await? {
                targets.push(link);
            }
        }

        if targets.is_empty() {
            debug!("booking has no mirrored events to delete");
            return Ok(());
        }

        let connections = self.connections.connections_for_tutor(&params.tutor_id).await?;
        let mut last_error: Option<TutorlaneError> = None;

        for link in &targets {
            let connection = connections.iter().find(|c| c.id == link.connection_id);
            let Some(connection) = connection.filter(|c| c.is_live_queryable()) else {
                self.retire_link(link).await;
                continue;
            };

            match self.delete_on_connection(connection, link).await {
                Ok(()) => self.retire_link(link).await,
                Err(err) => {
                    warn!(
                        connection_id = %connection.id,
                        provider = %connection.provider,
                        error = %err,
                        "failed to delete mirrored event"
                    );
                    last_error = Some(err);
                }
            }
        }

        if let Some(err) = last_error {
            return Err(err);
        }
        Ok(())
    }

    /// Try to adopt an event mirrored before link rows existed. Returns true
    /// when a candidate was found and linked.
    async fn relink_legacy(
        &self,
        params: &BookingEventParams,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        connections: &[CalendarConnection],
    ) -> Result<bool> {
        if let Some(link) = self.legacy_link(params, start, end, connections).await? {
            info!(
                provider_event_id = %link.provider_event_id,
                provider = %link.provider,
                "re-linked legacy calendar event instead of creating a duplicate"
            );
            self.links.insert_link(&link).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Heuristic match for an unlinked cached event with this booking's
    /// exact times and title prefix. First match wins.
    async fn legacy_link(
        &self,
        params: &BookingEventParams,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        connections: &[CalendarConnection],
    ) -> Result<Option<BookingCalendarLink>> {
        let candidate = self
            .cache
            .find_legacy_candidate(&params.tutor_id, start, end, &params.title)
            .await?;
        let Some(candidate) = candidate else {
            return Ok(None);
        };

        let connection = connections.iter().find(|c| {
            c.provider == candidate.provider && c.provider_account == candidate.provider_account
        });
        let Some(connection) = connection else {
            debug!(
                provider_event_id = %candidate.provider_event_id,
                "legacy candidate has no matching connection"
            );
            return Ok(None);
        };

        Ok(Some(BookingCalendarLink {
            id: Uuid::now_v7().to_string(),
            booking_id: params.booking_id.clone(),
            tutor_id: params.tutor_id.clone(),
            connection_id: connection.id.clone(),
            provider: candidate.provider,
            provider_event_id: candidate.provider_event_id.clone(),
            created_at: Utc::now(),
        }))
    }

    async fn create_on_connection(
        &self,
        connection: &CalendarConnection,
        params: &BookingEventParams,
    ) -> Result<()> {
        let token = self.access_token(connection).await?;
        let adapter = self.adapter(connection)?;
        let payload = payload_for(params);

        let event = tokio::time::timeout(
            self.provider_timeout,
            adapter.create_event(&token, &payload),
        )
        .await
        .map_err(|_| {
            TutorlaneError::Network(format!(
                "{} event creation timed out after {:?}",
                connection.provider, self.provider_timeout
            ))
        })??;

        // The provider mutation is the success criterion; local bookkeeping
        // failures are logged and the legacy matcher re-links later.
        let now = Utc::now();
        let row = cached_event_from_provider(connection, &event, now);
        if let Err(err) = self.cache.upsert_events(std::slice::from_ref(&row)).await {
            error!(
                connection_id = %connection.id,
                error = %err,
                "provider event created but cache write failed"
            );
        }
        let link = BookingCalendarLink {
            id: Uuid::now_v7().to_string(),
            booking_id: params.booking_id.clone(),
            tutor_id: params.tutor_id.clone(),
            connection_id: connection.id.clone(),
            provider: connection.provider,
            provider_event_id: event.event_id.clone(),
            created_at: now,
        };
        if let Err(err) = self.links.insert_link(&link).await {
            error!(
                connection_id = %connection.id,
                error = %err,
                "provider event created but link write failed"
            );
        }

        debug!(
            connection_id = %connection.id,
            provider = %connection.provider,
            provider_event_id = %event.event_id,
            "mirrored booking onto provider calendar"
        );
        Ok(())
    }

    async fn update_on_connection(
        &self,
        connection: &CalendarConnection,
        link: &BookingCalendarLink,
        params: &BookingEventParams,
        create_if_missing: bool,
    ) -> Result<()> {
        let token = self.access_token(connection).await?;
        let adapter = self.adapter(connection)?;
        let event_ref = self.event_ref(link).await?;
        let payload = payload_for(params);

        let outcome = tokio::time::timeout(
            self.provider_timeout,
            adapter.update_event(&token, &event_ref, &payload),
        )
        .await
        .map_err(|_| {
            TutorlaneError::Network(format!(
                "{} event update timed out after {:?}",
                connection.provider, self.provider_timeout
            ))
        })??;

        match outcome {
            UpdateOutcome::Updated(event) => {
                let row = cached_event_from_provider(connection, &event, Utc::now());
                if let Err(err) = self.cache.upsert_events(std::slice::from_ref(&row)).await {
                    error!(
                        connection_id = %connection.id,
                        error = %err,
                        "provider event updated but cache write failed"
                    );
                }
                Ok(())
            }
            UpdateOutcome::NotFound => {
                debug!(
                    provider_event_id = %link.provider_event_id,
                    "provider event gone during update; reconciling locally"
                );
                self.retire_link(link).await;
                if create_if_missing {
                    self.create_on_connection(connection, params).await?;
                }
                Ok(())
            }
        }
    }

    async fn delete_on_connection(
        &self,
        connection: &CalendarConnection,
        link: &BookingCalendarLink,
    ) -> Result<()> {
        let token = self.access_token(connection).await?;
        let adapter = self.adapter(connection)?;
        let event_ref = self.event_ref(link).await?;

        let outcome = tokio::time::timeout(
            self.provider_timeout,
            adapter.delete_event(&token, &event_ref),
        )
        .await
        .map_err(|_| {
            TutorlaneError::Network(format!(
                "{} event deletion timed out after {:?}",
                connection.provider, self.provider_timeout
            ))
        })??;

        if outcome == DeleteOutcome::NotFound {
            debug!(
                provider_event_id = %link.provider_event_id,
                "provider event already gone during delete"
            );
        }
        Ok(())
    }

    /// Cancel the mirrored event locally and drop its link row. Best-effort;
    /// failures are logged because these paths already run under degraded
    /// conditions.
    async fn retire_link(&self, link: &BookingCalendarLink) {
        if let Err(err) = self
            .cache
            .retire_event(&link.tutor_id, link.provider, &link.provider_event_id, Utc::now())
            .await
        {
            error!(
                provider_event_id = %link.provider_event_id,
                error = %err,
                "failed to cancel mirrored event locally"
            );
        }
        if let Err(err) = self.links.remove_link(&link.id).await {
            error!(link_id = %link.id, error = %err, "failed to remove booking link");
        }
    }

    async fn access_token(&self, connection: &CalendarConnection) -> Result<String> {
        self.tokens.ensure_fresh_access_token(connection).await?.ok_or_else(|| {
            TutorlaneError::Auth(format!(
                "connection {} has no usable access token",
                connection.id
            ))
        })
    }

    fn adapter(&self, connection: &CalendarConnection) -> Result<Arc<dyn CalendarProviderApi>> {
        self.providers.adapter_for(connection.provider).ok_or_else(|| {
            TutorlaneError::Config(format!(
                "no adapter registered for provider {}",
                connection.provider
            ))
        })
    }

    /// Resolve the provider-side reference for a linked event. The cached
    /// row carries the calendar id; when it is missing the provider default
    /// calendar is assumed.
    async fn event_ref(&self, link: &BookingCalendarLink) -> Result<ProviderEventRef> {
        let cached = self
            .cache
            .find_event(&link.tutor_id, link.provider, &link.provider_event_id)
            .await?;
        let calendar_id =
            cached.map(|event| event.calendar_id).unwrap_or_else(|| "primary".to_string());
        Ok(ProviderEventRef { calendar_id, event_id: link.provider_event_id.clone() })
    }
}

fn payload_for(params: &BookingEventParams) -> EventPayload {
    EventPayload {
        summary: params.title.clone(),
        description: params.description.clone(),
        start: params.start,
        end: params.end,
        timezone: params.timezone.clone(),
        attendee_email: params.attendee_email.clone(),
    }
}
