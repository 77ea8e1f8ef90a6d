//! Engine configuration.
//!
//! Serde-deserialisable config with environment overrides. OAuth client
//! credentials stay out of this struct; they are read from the environment
//! by [`crate::integrations::calendar::oauth::OAuthProviderSettings`].

use serde::{Deserialize, Serialize};
use tutorlane_domain::constants::{
    DEFAULT_LOOKAHEAD_DAYS, DEFAULT_PROVIDER_TIMEOUT_SECS, DEFAULT_RETENTION_DAYS,
};

/// Calendar engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
    #[serde(skip_serializing)]
    pub token_key_password: Option<String>,
}

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub provider_timeout_secs: u64,
    pub lookahead_days: i64,
    pub retention_days: i64,
    /// Cron expression driving the proactive cache warmup.
    pub warmup_cron: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "tutorlane-calendar.db".to_string(),
                pool_size: 8,
                token_key_password: None,
            },
            sync: SyncConfig {
                provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
                lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
                retention_days: DEFAULT_RETENTION_DAYS,
                warmup_cron: "0 */10 * * * *".to_string(),
            },
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `TUTORLANE_*` environment variables. A `.env`
    /// file is honoured when present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(path) = std::env::var("TUTORLANE_CALENDAR_DB_PATH") {
            config.database.path = path;
        }
        if let Some(pool_size) = env_parse("TUTORLANE_CALENDAR_DB_POOL_SIZE") {
            config.database.pool_size = pool_size;
        }
        config.database.token_key_password =
            std::env::var("TUTORLANE_CALENDAR_TOKEN_KEY").ok();
        if let Some(timeout) = env_parse("TUTORLANE_CALENDAR_PROVIDER_TIMEOUT_SECS") {
            config.sync.provider_timeout_secs = timeout;
        }
        if let Some(days) = env_parse("TUTORLANE_CALENDAR_LOOKAHEAD_DAYS") {
            config.sync.lookahead_days = days;
        }
        if let Some(days) = env_parse("TUTORLANE_CALENDAR_RETENTION_DAYS") {
            config.sync.retention_days = days;
        }
        if let Ok(cron) = std::env::var("TUTORLANE_CALENDAR_WARMUP_CRON") {
            config.sync.warmup_cron = cron;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = EngineConfig::default();
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.sync.provider_timeout_secs, 10);
        assert!(config.sync.lookahead_days > 0);
    }
}
