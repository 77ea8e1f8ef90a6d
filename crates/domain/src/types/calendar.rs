//! Calendar connection, busy window, and cached event models.
//!
//! These are the persistent shapes shared by the aggregator, the event
//! mirror, and the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::TutorlaneError;

/// External calendar provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarProviderKind {
    Google,
    Outlook,
}

impl CalendarProviderKind {
    /// Stable identifier used in storage and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Outlook => "outlook",
        }
    }

    /// Human-facing label used in the unified calendar view.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Google => "Google Calendar",
            Self::Outlook => "Outlook Calendar",
        }
    }
}

impl std::str::FromStr for CalendarProviderKind {
    type Err = TutorlaneError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "google" => Ok(Self::Google),
            "outlook" => Ok(Self::Outlook),
            other => {
                Err(TutorlaneError::InvalidInput(format!("unknown calendar provider: {other}")))
            }
        }
    }
}

impl std::fmt::Display for CalendarProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronization status of a calendar connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Healthy,
    Syncing,
    Error,
}

impl SyncStatus {
    /// Statuses that still permit live provider calls.
    pub fn is_syncable(&self) -> bool {
        matches!(self, Self::Idle | Self::Healthy | Self::Syncing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Healthy => "healthy",
            Self::Syncing => "syncing",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = TutorlaneError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "idle" => Ok(Self::Idle),
            "healthy" => Ok(Self::Healthy),
            "syncing" => Ok(Self::Syncing),
            "error" => Ok(Self::Error),
            other => Err(TutorlaneError::InvalidInput(format!("unknown sync status: {other}"))),
        }
    }
}

/// One OAuth-backed pairing of a tutor with an external calendar account.
///
/// Token columns hold ciphertext; plaintext tokens only ever exist in memory
/// inside the token manager. Connections are never hard-deleted — disabling
/// sets `sync_enabled = false` and token erasure is a retention-policy
/// concern outside this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConnection {
    pub id: String,
    pub tutor_id: String,
    pub provider: CalendarProviderKind,
    /// Provider-side account identity (usually the account email).
    pub provider_account: String,
    pub access_token_enc: String,
    pub refresh_token_enc: Option<String>,
    pub access_token_expires_at: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    pub sync_enabled: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl CalendarConnection {
    /// Whether this connection may be queried live at all.
    pub fn is_live_queryable(&self) -> bool {
        self.sync_enabled && self.status.is_syncable()
    }
}

/// An immutable busy interval in UTC. Pure value type, no identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether `instant` falls inside the window (start inclusive, end
    /// exclusive).
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Lifecycle status of a provider event as the cache last observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Tentative => "tentative",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = TutorlaneError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "confirmed" => Ok(Self::Confirmed),
            "tentative" => Ok(Self::Tentative),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(TutorlaneError::InvalidInput(format!("unknown event status: {other}"))),
        }
    }
}

/// Durable mirror of one provider event.
///
/// `(tutor_id, provider, provider_event_id)` is unique among live rows
/// (`deleted_at IS NULL`). Rows are soft-deleted only; the retention sweep is
/// the single hard-delete path and runs outside sync/mirror flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCalendarEvent {
    pub id: String,
    pub tutor_id: String,
    pub provider: CalendarProviderKind,
    pub provider_account: String,
    pub provider_event_id: String,
    pub calendar_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub summary: Option<String>,
    pub status: EventStatus,
    pub recurrence_master_id: Option<String>,
    pub is_all_day: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub last_seen_at: DateTime<Utc>,
}

impl CachedCalendarEvent {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start, self.end)
    }
}

/// Association between a platform booking and the provider event mirroring
/// it, one per connected provider calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCalendarLink {
    pub id: String,
    pub booking_id: String,
    pub tutor_id: String,
    pub connection_id: String,
    pub provider: CalendarProviderKind,
    pub provider_event_id: String,
    pub created_at: DateTime<Utc>,
}

/// Busy windows plus per-provider freshness signals, consumed by the
/// tutor-facing sync-health UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusyWindowReport {
    pub windows: Vec<TimeWindow>,
    /// Providers whose data came from a cache older than the staleness
    /// threshold.
    pub stale_providers: Vec<CalendarProviderKind>,
    /// Providers whose live call failed and were served from cache.
    pub unverified_providers: Vec<CalendarProviderKind>,
}

/// One row of the tutor's unified calendar view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEventView {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
    /// Source label, e.g. "Google Calendar (tutor@gmail.com)".
    pub source: String,
}
