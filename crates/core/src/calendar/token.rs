//! Connection token lifecycle.
//!
//! Keeps a connection's access token usable: returns the stored token while
//! it is comfortably fresh, otherwise runs a single refresh-token exchange
//! and persists the rotated pair before handing the token out.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, instrument, warn};
use tutorlane_domain::constants::TOKEN_EXPIRY_SLACK_SECS;
use tutorlane_domain::{CalendarConnection, Result, SyncStatus, TutorlaneError};

use super::ports::{ConnectionRepository, OAuthTokenExchanger, TokenCipher};

/// Token manager for calendar connections.
pub struct TokenManager {
    connections: Arc<dyn ConnectionRepository>,
    exchanger: Arc<dyn OAuthTokenExchanger>,
    cipher: Arc<dyn TokenCipher>,
}

impl TokenManager {
    pub fn new(
        connections: Arc<dyn ConnectionRepository>,
        exchanger: Arc<dyn OAuthTokenExchanger>,
        cipher: Arc<dyn TokenCipher>,
    ) -> Self {
        Self { connections, exchanger, cipher }
    }

    /// Return a valid plaintext access token for the connection, refreshing
    /// it first when it is within the expiry slack.
    ///
    /// `Ok(None)` means the connection is unusable until re-authorized: no
    /// refresh token is stored, or the token endpoint rejected the exchange
    /// (the connection is then marked `error` with the response status in
    /// the message). Persistence happens before the token is returned, so a
    /// crash after refresh cannot lose the rotated pair.
    ///
    /// # Errors
    /// Cipher failures, data-store failures, and transport-level exchange
    /// failures propagate; callers degrade to cached data.
    #[instrument(skip_all, fields(connection_id = %connection.id, provider = %connection.provider))]
    pub async fn ensure_fresh_access_token(
        &self,
        connection: &CalendarConnection,
    ) -> Result<Option<String>> {
        if let Some(expires_at) = connection.access_token_expires_at {
            if expires_at - Utc::now() > Duration::seconds(TOKEN_EXPIRY_SLACK_SECS) {
                return self.cipher.decrypt(&connection.access_token_enc).map(Some);
            }
        }

        let Some(refresh_token_enc) = connection.refresh_token_enc.as_deref() else {
            warn!("access token expired and no refresh token stored");
            return Ok(None);
        };
        let refresh_token = self.cipher.decrypt(refresh_token_enc)?;

        let refreshed =
            match self.exchanger.refresh_access_token(connection.provider, &refresh_token).await {
                Ok(refreshed) => refreshed,
                Err(TutorlaneError::Auth(message)) => {
                    warn!(error = %message, "token endpoint rejected refresh");
                    self.connections
                        .record_status(&connection.id, SyncStatus::Error, Some(&message))
                        .await?;
                    return Ok(None);
                }
                Err(err) => {
                    self.connections
                        .record_status(&connection.id, SyncStatus::Error, Some(&err.to_string()))
                        .await?;
                    return Err(err);
                }
            };

        let access_token_enc = self.cipher.encrypt(&refreshed.access_token)?;
        let expires_at = Utc::now() + Duration::seconds(refreshed.expires_in);
        let rotated_refresh_enc = refreshed
            .refresh_token
            .as_deref()
            .map(|token| self.cipher.encrypt(token))
            .transpose()?;

        self.connections
            .store_rotated_tokens(
                &connection.id,
                &access_token_enc,
                expires_at,
                rotated_refresh_enc.as_deref(),
            )
            .await?;
        self.connections.record_status(&connection.id, SyncStatus::Healthy, None).await?;

        debug!(expires_in = refreshed.expires_in, "access token refreshed");

        Ok(Some(refreshed.access_token))
    }
}
