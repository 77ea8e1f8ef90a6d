//! Calendar provider adapters and their directory.

use std::sync::Arc;

use chrono_tz::Tz;
use reqwest::{Client, StatusCode};
use tracing::warn;
use tutorlane_core::{CalendarProviderApi, ProviderDirectory};
use tutorlane_domain::{CalendarProviderKind, TutorlaneError};

pub mod google;
pub mod outlook;

pub use google::GoogleCalendarProvider;
pub use outlook::OutlookCalendarProvider;

/// Directory backed by the real REST adapters, one instance per provider.
pub struct HttpProviderDirectory {
    google: Arc<dyn CalendarProviderApi>,
    outlook: Arc<dyn CalendarProviderApi>,
}

impl HttpProviderDirectory {
    /// Build adapters sharing one HTTP client (and its timeouts).
    pub fn new(client: Client) -> Self {
        Self {
            google: Arc::new(GoogleCalendarProvider::new(client.clone())),
            outlook: Arc::new(OutlookCalendarProvider::new(client)),
        }
    }
}

impl ProviderDirectory for HttpProviderDirectory {
    fn adapter_for(
        &self,
        provider: CalendarProviderKind,
    ) -> Option<Arc<dyn CalendarProviderApi>> {
        match provider {
            CalendarProviderKind::Google => Some(self.google.clone()),
            CalendarProviderKind::Outlook => Some(self.outlook.clone()),
        }
    }
}

/// 404/410 are the "event gone" steady-state signals shared by both
/// providers.
pub(crate) fn is_not_found(status: StatusCode) -> bool {
    matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE)
}

/// Turn a non-2xx provider response into a hard failure carrying status and
/// body for diagnostics.
pub(crate) async fn api_error(provider: &str, response: reqwest::Response) -> TutorlaneError {
    let status = response.status();
    let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    TutorlaneError::Network(format!("{provider} API error ({status}): {body}"))
}

/// Resolve an IANA zone name, falling back to UTC for anything unknown.
pub(crate) fn resolve_zone(name: &str) -> Tz {
    if name.eq_ignore_ascii_case("utc") {
        return chrono_tz::UTC;
    }
    match name.parse::<Tz>() {
        Ok(zone) => zone,
        Err(_) => {
            warn!(zone = name, "unknown timezone from provider; assuming UTC");
            chrono_tz::UTC
        }
    }
}
