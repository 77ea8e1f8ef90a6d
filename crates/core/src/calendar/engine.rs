//! Facade exposed to availability and booking collaborators.
//!
//! Thin delegation layer over the aggregator and the mirror. The mirror
//! entry points convert service errors into [`MirrorOutcome`] values here,
//! so a calendar failure can never abort a booking confirmation, reschedule,
//! or cancellation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::error;
use tutorlane_domain::{
    BookingEventParams, BusyWindowReport, CalendarEventView, MirrorOutcome, Result, TimeWindow,
};

use super::availability::BusyWindowAggregator;
use super::mirror::EventMirror;

/// Entry point into the calendar engine.
pub struct CalendarEngine {
    aggregator: Arc<BusyWindowAggregator>,
    mirror: Arc<EventMirror>,
}

impl CalendarEngine {
    pub fn new(aggregator: Arc<BusyWindowAggregator>, mirror: Arc<EventMirror>) -> Self {
        Self { aggregator, mirror }
    }

    /// Busy intervals consumed by slot-availability computation.
    pub async fn get_calendar_busy_windows(
        &self,
        tutor_id: &str,
        start: DateTime<Utc>,
        days: i64,
    ) -> Result<Vec<TimeWindow>> {
        self.aggregator.busy_windows(tutor_id, start, days).await
    }

    /// Busy intervals plus per-provider freshness, consumed by the
    /// sync-health UI.
    pub async fn get_calendar_busy_windows_with_status(
        &self,
        tutor_id: &str,
        start: DateTime<Utc>,
        days: i64,
    ) -> Result<BusyWindowReport> {
        self.aggregator.busy_windows_with_status(tutor_id, start, days).await
    }

    /// Event rows for the tutor's unified calendar view.
    pub async fn get_calendar_events_with_details(
        &self,
        tutor_id: &str,
        start: DateTime<Utc>,
        days: i64,
    ) -> Result<Vec<CalendarEventView>> {
        self.aggregator.events_with_details(tutor_id, start, days).await
    }

    /// Mirror a confirmed booking onto the tutor's connected calendars.
    pub async fn create_calendar_event_for_booking(
        &self,
        params: &BookingEventParams,
        force_create: bool,
    ) -> MirrorOutcome {
        match self.mirror.mirror_booking_created(params, force_create).await {
            Ok(()) => MirrorOutcome::ok(),
            Err(err) => {
                error!(booking_id = %params.booking_id, error = %err, "calendar mirror create failed");
                MirrorOutcome::failed(err.to_string())
            }
        }
    }

    /// Propagate a booking reschedule to mirrored provider events.
    pub async fn update_calendar_event_for_booking(
        &self,
        params: &BookingEventParams,
        create_if_missing: bool,
    ) -> MirrorOutcome {
        match self.mirror.mirror_booking_updated(params, create_if_missing).await {
            Ok(()) => MirrorOutcome::ok(),
            Err(err) => {
                error!(booking_id = %params.booking_id, error = %err, "calendar mirror update failed");
                MirrorOutcome::failed(err.to_string())
            }
        }
    }

    /// Delete mirrored provider events for a cancelled booking.
    pub async fn delete_calendar_events_for_booking(
        &self,
        params: &BookingEventParams,
    ) -> MirrorOutcome {
        match self.mirror.mirror_booking_cancelled(params).await {
            Ok(()) => MirrorOutcome::ok(),
            Err(err) => {
                error!(booking_id = %params.booking_id, error = %err, "calendar mirror delete failed");
                MirrorOutcome::failed(err.to_string())
            }
        }
    }
}
