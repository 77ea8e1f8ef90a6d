//! Port interfaces of the calendar engine.
//!
//! Everything impure enters through these traits: the data store, the
//! provider REST APIs, the OAuth token endpoint, and the token cipher. Infra
//! supplies the real implementations; tests supply in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tutorlane_domain::{
    BookingCalendarLink, CachedCalendarEvent, CalendarConnection, CalendarProviderKind,
    DeleteOutcome, EventPayload, ProviderEvent, ProviderEventRef, RefreshedToken, Result,
    SyncStatus, TimeWindow, UpdateOutcome,
};

/// Access to stored calendar connections.
///
/// Mutations address a single connection row and must be applied atomically
/// per row, so a slow token refresh racing a concurrent sync cannot clobber
/// a newer token.
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn connections_for_tutor(&self, tutor_id: &str) -> Result<Vec<CalendarConnection>>;

    /// Persist a freshly exchanged token pair. `refresh_token_enc` is only
    /// written when the provider rotated it.
    async fn store_rotated_tokens(
        &self,
        connection_id: &str,
        access_token_enc: &str,
        expires_at: DateTime<Utc>,
        refresh_token_enc: Option<&str>,
    ) -> Result<()>;

    /// Record a status transition, replacing the stored error message.
    async fn record_status(
        &self,
        connection_id: &str,
        status: SyncStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Record a successful live sync.
    async fn record_synced(&self, connection_id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Durable cache of observed provider events.
///
/// Writes are upserts keyed by `(tutor_id, provider, provider_event_id)`
/// among live rows; upserting refreshes `last_seen_at` and clears
/// `deleted_at`. Rows are only ever soft-deleted here - the retention sweep
/// is the single hard-delete path.
#[async_trait]
pub trait EventCacheRepository: Send + Sync {
    async fn upsert_events(&self, events: &[CachedCalendarEvent]) -> Result<()>;

    /// Live (non-deleted) rows for one connected account overlapping `range`.
    async fn events_for_account(
        &self,
        tutor_id: &str,
        provider: CalendarProviderKind,
        provider_account: &str,
        range: &TimeWindow,
    ) -> Result<Vec<CachedCalendarEvent>>;

    /// Live rows for a tutor across all accounts overlapping `range`.
    async fn events_for_tutor(
        &self,
        tutor_id: &str,
        range: &TimeWindow,
    ) -> Result<Vec<CachedCalendarEvent>>;

    /// Look up one live row by its provider event id.
    async fn find_event(
        &self,
        tutor_id: &str,
        provider: CalendarProviderKind,
        provider_event_id: &str,
    ) -> Result<Option<CachedCalendarEvent>>;

    /// Mark a row cancelled and soft-deleted (provider reported the event
    /// gone, or the booking no longer needs it).
    async fn retire_event(
        &self,
        tutor_id: &str,
        provider: CalendarProviderKind,
        provider_event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Find an unlinked live row with exactly matching times whose summary
    /// starts with `title_prefix`. Compatibility shim for events mirrored
    /// before link rows existed; best-effort, first match wins.
    async fn find_legacy_candidate(
        &self,
        tutor_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        title_prefix: &str,
    ) -> Result<Option<CachedCalendarEvent>>;

    /// Hard-purge rows soft-deleted longer than `days` ago. Retention hook,
    /// never called from sync or mirror paths.
    async fn purge_deleted_older_than(&self, days: i64) -> Result<usize>;
}

/// Association rows between bookings and the provider events mirroring them.
#[async_trait]
pub trait BookingLinkRepository: Send + Sync {
    async fn links_for_booking(&self, booking_id: &str) -> Result<Vec<BookingCalendarLink>>;

    /// Insert a link; upserts on `(booking_id, connection_id)`.
    async fn insert_link(&self, link: &BookingCalendarLink) -> Result<()>;

    /// Remove a link whose mirrored event is gone.
    async fn remove_link(&self, link_id: &str) -> Result<()>;
}

/// Uniform surface over one provider's calendar REST API.
///
/// Listings are fully paged, normalized to UTC, and exclude cancelled and
/// transparent/free events. A 404/410 on update/delete surfaces as the
/// `NotFound` outcome, never as an error.
#[async_trait]
pub trait CalendarProviderApi: Send + Sync {
    async fn list_busy_events(
        &self,
        access_token: &str,
        range: &TimeWindow,
    ) -> Result<Vec<ProviderEvent>>;

    async fn create_event(
        &self,
        access_token: &str,
        payload: &EventPayload,
    ) -> Result<ProviderEvent>;

    async fn update_event(
        &self,
        access_token: &str,
        event_ref: &ProviderEventRef,
        payload: &EventPayload,
    ) -> Result<UpdateOutcome>;

    async fn delete_event(
        &self,
        access_token: &str,
        event_ref: &ProviderEventRef,
    ) -> Result<DeleteOutcome>;
}

/// Maps a provider tag to its adapter instance.
pub trait ProviderDirectory: Send + Sync {
    fn adapter_for(&self, provider: CalendarProviderKind) -> Option<Arc<dyn CalendarProviderApi>>;
}

/// Refresh-token exchange against a provider token endpoint
/// (`grant_type=refresh_token`). Single attempt, no backoff.
#[async_trait]
pub trait OAuthTokenExchanger: Send + Sync {
    async fn refresh_access_token(
        &self,
        provider: CalendarProviderKind,
        refresh_token: &str,
    ) -> Result<RefreshedToken>;
}

/// Encryption capability for token columns, injected into the token manager
/// so tests can substitute it.
pub trait TokenCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String>;
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}
