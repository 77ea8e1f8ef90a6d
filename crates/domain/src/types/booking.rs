//! Booking lifecycle shapes consumed from the scheduling collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload of a booking lifecycle notification (create/update/cancel).
///
/// `previous_start`/`previous_end` carry the pre-reschedule times and feed
/// the legacy event matcher when no link row exists yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEventParams {
    pub booking_id: String,
    pub tutor_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// IANA timezone identifier for the booking's wall-clock times.
    pub timezone: String,
    pub attendee_email: Option<String>,
    pub previous_start: Option<DateTime<Utc>>,
    pub previous_end: Option<DateTime<Utc>>,
}

/// Result of a mirror operation as reported to the booking workflow.
///
/// Mirroring is best-effort: a failed mirror never blocks the booking
/// transaction, so failures surface here instead of as raised errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl MirrorOutcome {
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }
}
