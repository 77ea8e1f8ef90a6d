//! OAuth token-endpoint client.
//!
//! Performs the `grant_type=refresh_token` exchange against each provider's
//! token endpoint using its client credentials. One attempt per call; retry
//! policy belongs to the callers' degrade-to-cache behaviour.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use tutorlane_core::OAuthTokenExchanger;
use tutorlane_domain::{CalendarProviderKind, RefreshedToken, Result, TutorlaneError};

const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const MICROSOFT_TOKEN_ENDPOINT: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Client credentials and token endpoint for one provider.
#[derive(Debug, Clone)]
pub struct OAuthProviderSettings {
    pub client_id: String,
    pub client_secret: String,
    pub token_endpoint: String,
}

impl OAuthProviderSettings {
    pub fn google(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
        }
    }

    pub fn outlook(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_endpoint: MICROSOFT_TOKEN_ENDPOINT.to_string(),
        }
    }

    /// Read Google credentials from the environment.
    pub fn google_from_env() -> Result<Self> {
        let client_id = require_env("GOOGLE_CALENDAR_CLIENT_ID")?;
        let client_secret = require_env("GOOGLE_CALENDAR_CLIENT_SECRET")?;
        Ok(Self::google(client_id, client_secret))
    }

    /// Read Outlook credentials from the environment.
    pub fn outlook_from_env() -> Result<Self> {
        let client_id = require_env("OUTLOOK_CALENDAR_CLIENT_ID")?;
        let client_secret = require_env("OUTLOOK_CALENDAR_CLIENT_SECRET")?;
        Ok(Self::outlook(client_id, client_secret))
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| TutorlaneError::Auth(format!("{name} not set")))
}

/// HTTP implementation of the refresh exchange.
pub struct HttpTokenExchanger {
    client: Client,
    settings: HashMap<CalendarProviderKind, OAuthProviderSettings>,
}

impl HttpTokenExchanger {
    pub fn new(client: Client) -> Self {
        Self { client, settings: HashMap::new() }
    }

    pub fn with_provider(
        mut self,
        provider: CalendarProviderKind,
        settings: OAuthProviderSettings,
    ) -> Self {
        self.settings.insert(provider, settings);
        self
    }
}

#[async_trait]
impl OAuthTokenExchanger for HttpTokenExchanger {
    async fn refresh_access_token(
        &self,
        provider: CalendarProviderKind,
        refresh_token: &str,
    ) -> Result<RefreshedToken> {
        let settings = self.settings.get(&provider).ok_or_else(|| {
            TutorlaneError::Config(format!("no OAuth credentials configured for {provider}"))
        })?;

        let response = self
            .client
            .post(&settings.token_endpoint)
            .form(&[
                ("client_id", settings.client_id.as_str()),
                ("client_secret", settings.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| {
                TutorlaneError::Network(format!("Token refresh request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TutorlaneError::Auth(format!(
                "Token refresh failed ({status}): {body}"
            )));
        }

        let refreshed: TokenEndpointResponse = response.json().await.map_err(|e| {
            TutorlaneError::Auth(format!("Failed to parse token response: {e}"))
        })?;

        debug!(%provider, expires_in = refreshed.expires_in, "refresh exchange succeeded");

        Ok(RefreshedToken {
            access_token: refreshed.access_token,
            expires_in: refreshed.expires_in,
            refresh_token: refreshed.refresh_token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}
