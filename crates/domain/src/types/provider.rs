//! Normalized provider payload shapes.
//!
//! Providers differ wildly (date-only vs timed events, recurrence master
//! ids, calendar-id requirements); everything above the adapter layer sees
//! only these shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::calendar::EventStatus;

/// Event content sent to a provider on create/update.
///
/// `timezone` is an IANA identifier, never a bare offset — providers need
/// zone-aware wall-clock times for recurring-friendly semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: String,
    pub attendee_email: Option<String>,
}

/// Reference to an existing provider event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEventRef {
    pub calendar_id: String,
    pub event_id: String,
}

/// A provider event normalized to UTC, after cancelled and transparent/free
/// entries have been filtered out of listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEvent {
    pub event_id: String,
    pub calendar_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub summary: Option<String>,
    pub status: EventStatus,
    pub recurrence_master_id: Option<String>,
    pub is_all_day: bool,
}

/// Outcome of a provider update call. A 404/410 is a distinct steady-state
/// signal, not a transport failure.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    Updated(ProviderEvent),
    NotFound,
}

/// Outcome of a provider delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Token pair returned by a provider token endpoint on refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Lifetime of the new access token in seconds.
    pub expires_in: i64,
    /// Present only when the provider rotated the refresh token.
    pub refresh_token: Option<String>,
}
