//! Google Calendar provider adapter

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tutorlane_core::CalendarProviderApi;
use tutorlane_domain::constants::PROVIDER_MAX_PAGE_SIZE;
use tutorlane_domain::{
    DeleteOutcome, EventPayload, EventStatus, ProviderEvent, ProviderEventRef, Result,
    TimeWindow, TutorlaneError, UpdateOutcome,
};

use super::{api_error, is_not_found, resolve_zone};

const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const DEFAULT_CALENDAR_ID: &str = "primary";

/// Google Calendar provider
pub struct GoogleCalendarProvider {
    client: Client,
    base_url: String,
}

impl GoogleCalendarProvider {
    pub fn new(client: Client) -> Self {
        Self { client, base_url: GOOGLE_CALENDAR_API_BASE.to_string() }
    }

    /// Point the adapter at a different API base (tests).
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{}/events", self.base_url, calendar_id)
    }
}

impl Default for GoogleCalendarProvider {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

#[async_trait]
impl CalendarProviderApi for GoogleCalendarProvider {
    async fn list_busy_events(
        &self,
        access_token: &str,
        range: &TimeWindow,
    ) -> Result<Vec<ProviderEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("timeMin", range.start.to_rfc3339()),
                ("timeMax", range.end.to_rfc3339()),
                ("maxResults", PROVIDER_MAX_PAGE_SIZE.to_string()),
                ("timeZone", "UTC".to_string()),
            ];
            if let Some(ref token) = page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .client
                .get(self.events_url(DEFAULT_CALENDAR_ID))
                .bearer_auth(access_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| {
                    TutorlaneError::Network(format!("Google API request failed: {e}"))
                })?;

            if !response.status().is_success() {
                return Err(api_error("Google", response).await);
            }

            let page: GoogleEventsResponse = response.json().await.map_err(|e| {
                TutorlaneError::InvalidInput(format!("Failed to parse Google response: {e}"))
            })?;

            for item in page.items {
                if item.status.as_deref() == Some("cancelled") {
                    continue;
                }
                // Transparent events do not block time.
                if item.transparency.as_deref() == Some("transparent") {
                    continue;
                }
                match provider_event_from_item(item) {
                    Ok(event) => events.push(event),
                    Err(err) => warn!(error = %err, "skipping unparseable Google event"),
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        debug!(count = events.len(), "listed Google busy events");
        Ok(events)
    }

    async fn create_event(
        &self,
        access_token: &str,
        payload: &EventPayload,
    ) -> Result<ProviderEvent> {
        let body = GoogleEventWrite::from_payload(payload);

        let response = self
            .client
            .post(self.events_url(DEFAULT_CALENDAR_ID))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| TutorlaneError::Network(format!("Google API request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(api_error("Google", response).await);
        }

        let item: GoogleEventItem = response.json().await.map_err(|e| {
            TutorlaneError::InvalidInput(format!("Failed to parse Google response: {e}"))
        })?;
        provider_event_from_item(item)
    }

    async fn update_event(
        &self,
        access_token: &str,
        event_ref: &ProviderEventRef,
        payload: &EventPayload,
    ) -> Result<UpdateOutcome> {
        let url =
            format!("{}/{}", self.events_url(&event_ref.calendar_id), event_ref.event_id);
        let body = GoogleEventWrite::from_payload(payload);

        let response = self
            .client
            .patch(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| TutorlaneError::Network(format!("Google API request failed: {e}")))?;

        if is_not_found(response.status()) {
            return Ok(UpdateOutcome::NotFound);
        }
        if !response.status().is_success() {
            return Err(api_error("Google", response).await);
        }

        let item: GoogleEventItem = response.json().await.map_err(|e| {
            TutorlaneError::InvalidInput(format!("Failed to parse Google response: {e}"))
        })?;
        Ok(UpdateOutcome::Updated(provider_event_from_item(item)?))
    }

    async fn delete_event(
        &self,
        access_token: &str,
        event_ref: &ProviderEventRef,
    ) -> Result<DeleteOutcome> {
        let url =
            format!("{}/{}", self.events_url(&event_ref.calendar_id), event_ref.event_id);

        let response =
            self.client.delete(&url).bearer_auth(access_token).send().await.map_err(|e| {
                TutorlaneError::Network(format!("Google API request failed: {e}"))
            })?;

        if is_not_found(response.status()) {
            return Ok(DeleteOutcome::NotFound);
        }
        if !response.status().is_success() {
            return Err(api_error("Google", response).await);
        }
        Ok(DeleteOutcome::Deleted)
    }
}

fn provider_event_from_item(item: GoogleEventItem) -> Result<ProviderEvent> {
    let is_all_day = item.start.date.is_some();
    let start = resolve_event_time(&item.start)?;
    let end = resolve_event_time(&item.end)?;
    let status = match item.status.as_deref() {
        Some("tentative") => EventStatus::Tentative,
        _ => EventStatus::Confirmed,
    };

    Ok(ProviderEvent {
        event_id: item.id,
        calendar_id: DEFAULT_CALENDAR_ID.to_string(),
        start,
        end,
        summary: item.summary.filter(|s| !s.trim().is_empty()),
        status,
        recurrence_master_id: item.recurring_event_id,
        is_all_day,
    })
}

/// Resolve Google's dateTime-or-date representation to a UTC instant.
/// Date-only values (all-day events) resolve to UTC midnight.
fn resolve_event_time(value: &GoogleEventDateTime) -> Result<DateTime<Utc>> {
    if let Some(ref date_time) = value.date_time {
        return DateTime::parse_from_rfc3339(date_time)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                TutorlaneError::InvalidInput(format!("Invalid timestamp '{date_time}': {e}"))
            });
    }
    if let Some(ref date) = value.date {
        let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
            TutorlaneError::InvalidInput(format!("Invalid all-day date '{date}': {e}"))
        })?;
        let midnight = parsed.and_hms_opt(0, 0, 0).ok_or_else(|| {
            TutorlaneError::InvalidInput(format!("Invalid all-day date '{date}'"))
        })?;
        return Ok(midnight.and_utc());
    }
    Err(TutorlaneError::InvalidInput("Google event time missing dateTime and date".into()))
}

#[derive(Debug, Deserialize)]
struct GoogleEventsResponse {
    #[serde(default)]
    items: Vec<GoogleEventItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventItem {
    id: String,
    status: Option<String>,
    transparency: Option<String>,
    summary: Option<String>,
    start: GoogleEventDateTime,
    end: GoogleEventDateTime,
    #[serde(rename = "recurringEventId")]
    recurring_event_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventDateTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct GoogleEventWrite {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    start: GoogleEventTimeWrite,
    end: GoogleEventTimeWrite,
    #[serde(skip_serializing_if = "Option::is_none")]
    attendees: Option<Vec<GoogleAttendeeWrite>>,
}

impl GoogleEventWrite {
    fn from_payload(payload: &EventPayload) -> Self {
        let zone = resolve_zone(&payload.timezone);
        Self {
            summary: payload.summary.clone(),
            description: payload.description.clone(),
            start: GoogleEventTimeWrite {
                date_time: payload.start.with_timezone(&zone).to_rfc3339(),
                time_zone: payload.timezone.clone(),
            },
            end: GoogleEventTimeWrite {
                date_time: payload.end.with_timezone(&zone).to_rfc3339(),
                time_zone: payload.timezone.clone(),
            },
            attendees: payload
                .attendee_email
                .as_ref()
                .map(|email| vec![GoogleAttendeeWrite { email: email.clone() }]),
        }
    }
}

#[derive(Debug, Serialize)]
struct GoogleEventTimeWrite {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone")]
    time_zone: String,
}

#[derive(Debug, Serialize)]
struct GoogleAttendeeWrite {
    email: String,
}
