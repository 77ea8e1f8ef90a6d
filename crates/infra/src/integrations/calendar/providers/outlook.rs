//! Outlook Calendar provider adapter (Microsoft Graph)

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tutorlane_core::CalendarProviderApi;
use tutorlane_domain::{
    DeleteOutcome, EventPayload, EventStatus, ProviderEvent, ProviderEventRef, Result,
    TimeWindow, TutorlaneError, UpdateOutcome,
};

use super::{api_error, is_not_found, resolve_zone};

const MICROSOFT_GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
const OUTLOOK_TIMEZONE_HEADER: &str = r#"outlook.timezone="UTC""#;
const OUTLOOK_PAGE_SIZE: u32 = 250;

/// Outlook Calendar provider
pub struct OutlookCalendarProvider {
    client: Client,
    base_url: String,
}

impl OutlookCalendarProvider {
    pub fn new(client: Client) -> Self {
        Self { client, base_url: MICROSOFT_GRAPH_API_BASE.to_string() }
    }

    /// Point the adapter at a different API base (tests).
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

impl Default for OutlookCalendarProvider {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

#[async_trait]
impl CalendarProviderApi for OutlookCalendarProvider {
    async fn list_busy_events(
        &self,
        access_token: &str,
        range: &TimeWindow,
    ) -> Result<Vec<ProviderEvent>> {
        let mut events = Vec::new();
        let first_url = format!(
            "{}/me/calendarView?startDateTime={}&endDateTime={}&$top={}",
            self.base_url,
            range.start.to_rfc3339(),
            range.end.to_rfc3339(),
            OUTLOOK_PAGE_SIZE,
        );
        let mut next_url = Some(first_url);

        while let Some(url) = next_url {
            let response = self
                .client
                .get(&url)
                .bearer_auth(access_token)
                .header("Prefer", OUTLOOK_TIMEZONE_HEADER)
                .send()
                .await
                .map_err(|e| {
                    TutorlaneError::Network(format!("Microsoft API request failed: {e}"))
                })?;

            if !response.status().is_success() {
                return Err(api_error("Microsoft", response).await);
            }

            let page: GraphEventsResponse = response.json().await.map_err(|e| {
                TutorlaneError::InvalidInput(format!("Failed to parse Microsoft response: {e}"))
            })?;

            for item in page.value {
                if item.is_cancelled.unwrap_or(false) {
                    continue;
                }
                // "free" events do not block time.
                if item.show_as.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("free")) {
                    continue;
                }
                match provider_event_from_item(item) {
                    Ok(event) => events.push(event),
                    Err(err) => warn!(error = %err, "skipping unparseable Microsoft event"),
                }
            }

            // Graph pagination hands back an absolute URL.
            next_url = page.next_link;
        }

        debug!(count = events.len(), "listed Outlook busy events");
        Ok(events)
    }

    async fn create_event(
        &self,
        access_token: &str,
        payload: &EventPayload,
    ) -> Result<ProviderEvent> {
        let body = GraphEventWrite::from_payload(payload);

        let response = self
            .client
            .post(format!("{}/me/events", self.base_url))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| TutorlaneError::Network(format!("Microsoft API request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(api_error("Microsoft", response).await);
        }

        let item: GraphEventItem = response.json().await.map_err(|e| {
            TutorlaneError::InvalidInput(format!("Failed to parse Microsoft response: {e}"))
        })?;
        provider_event_from_item(item)
    }

    async fn update_event(
        &self,
        access_token: &str,
        event_ref: &ProviderEventRef,
        payload: &EventPayload,
    ) -> Result<UpdateOutcome> {
        let url = format!("{}/me/events/{}", self.base_url, event_ref.event_id);
        let body = GraphEventWrite::from_payload(payload);

        let response = self
            .client
            .patch(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| TutorlaneError::Network(format!("Microsoft API request failed: {e}")))?;

        if is_not_found(response.status()) {
            return Ok(UpdateOutcome::NotFound);
        }
        if !response.status().is_success() {
            return Err(api_error("Microsoft", response).await);
        }

        let item: GraphEventItem = response.json().await.map_err(|e| {
            TutorlaneError::InvalidInput(format!("Failed to parse Microsoft response: {e}"))
        })?;
        Ok(UpdateOutcome::Updated(provider_event_from_item(item)?))
    }

    async fn delete_event(
        &self,
        access_token: &str,
        event_ref: &ProviderEventRef,
    ) -> Result<DeleteOutcome> {
        let url = format!("{}/me/events/{}", self.base_url, event_ref.event_id);

        let response =
            self.client.delete(&url).bearer_auth(access_token).send().await.map_err(|e| {
                TutorlaneError::Network(format!("Microsoft API request failed: {e}"))
            })?;

        if is_not_found(response.status()) {
            return Ok(DeleteOutcome::NotFound);
        }
        if !response.status().is_success() {
            return Err(api_error("Microsoft", response).await);
        }
        Ok(DeleteOutcome::Deleted)
    }
}

fn provider_event_from_item(item: GraphEventItem) -> Result<ProviderEvent> {
    let start = resolve_event_time(&item.start)?;
    let end = resolve_event_time(&item.end)?;
    let status = match item.show_as.as_deref() {
        Some(show_as) if show_as.eq_ignore_ascii_case("tentative") => EventStatus::Tentative,
        _ => EventStatus::Confirmed,
    };

    Ok(ProviderEvent {
        event_id: item.id,
        calendar_id: "primary".to_string(),
        start,
        end,
        summary: item.subject.filter(|s| !s.trim().is_empty()),
        status,
        recurrence_master_id: item.series_master_id,
        is_all_day: item.is_all_day.unwrap_or(false),
    })
}

/// Resolve Graph's naive-datetime-plus-zone-name representation to a UTC
/// instant. Graph datetimes may carry fractional seconds.
fn resolve_event_time(value: &GraphDateTimeTimeZone) -> Result<DateTime<Utc>> {
    let trimmed = value.date_time.trim();
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f").map_err(|e| {
        TutorlaneError::InvalidInput(format!("Invalid Microsoft timestamp '{trimmed}': {e}"))
    })?;

    let zone = resolve_zone(value.time_zone.as_deref().unwrap_or("UTC"));
    zone.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            TutorlaneError::InvalidInput(format!(
                "Ambiguous local time '{trimmed}' in zone {zone}"
            ))
        })
}

#[derive(Debug, Deserialize)]
struct GraphEventsResponse {
    #[serde(default)]
    value: Vec<GraphEventItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphEventItem {
    id: String,
    subject: Option<String>,
    start: GraphDateTimeTimeZone,
    end: GraphDateTimeTimeZone,
    #[serde(rename = "isAllDay")]
    is_all_day: Option<bool>,
    #[serde(rename = "isCancelled")]
    is_cancelled: Option<bool>,
    #[serde(rename = "showAs")]
    show_as: Option<String>,
    #[serde(rename = "seriesMasterId")]
    series_master_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphDateTimeTimeZone {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone")]
    time_zone: Option<String>,
}

#[derive(Debug, Serialize)]
struct GraphEventWrite {
    subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<GraphItemBody>,
    start: GraphDateTimeWrite,
    end: GraphDateTimeWrite,
    #[serde(skip_serializing_if = "Option::is_none")]
    attendees: Option<Vec<GraphAttendeeWrite>>,
}

impl GraphEventWrite {
    fn from_payload(payload: &EventPayload) -> Self {
        let zone = resolve_zone(&payload.timezone);
        let format_local = |instant: DateTime<Utc>| {
            instant.with_timezone(&zone).naive_local().format("%Y-%m-%dT%H:%M:%S").to_string()
        };
        Self {
            subject: payload.summary.clone(),
            body: payload.description.as_ref().map(|content| GraphItemBody {
                content_type: "text".to_string(),
                content: content.clone(),
            }),
            start: GraphDateTimeWrite {
                date_time: format_local(payload.start),
                time_zone: payload.timezone.clone(),
            },
            end: GraphDateTimeWrite {
                date_time: format_local(payload.end),
                time_zone: payload.timezone.clone(),
            },
            attendees: payload.attendee_email.as_ref().map(|email| {
                vec![GraphAttendeeWrite {
                    email_address: GraphEmailAddress { address: email.clone() },
                    attendee_type: "required".to_string(),
                }]
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct GraphItemBody {
    #[serde(rename = "contentType")]
    content_type: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct GraphDateTimeWrite {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone")]
    time_zone: String,
}

#[derive(Debug, Serialize)]
struct GraphAttendeeWrite {
    #[serde(rename = "emailAddress")]
    email_address: GraphEmailAddress,
    #[serde(rename = "type")]
    attendee_type: String,
}

#[derive(Debug, Serialize)]
struct GraphEmailAddress {
    address: String,
}
