//! Domain constants
//!
//! Centralized location for the thresholds and limits the sync engine relies
//! on.

/// Access tokens closer than this to expiry are refreshed before use.
pub const TOKEN_EXPIRY_SLACK_SECS: i64 = 60;

/// Cached busy data older than this is reported as stale.
pub const CACHE_STALE_AFTER_SECS: i64 = 600;

/// Largest page size any provider accepts for event listings.
pub const PROVIDER_MAX_PAGE_SIZE: u32 = 2500;

/// Default per-connection timeout applied to live provider calls.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Default lookahead for availability queries.
pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 14;

/// Soft-deleted cache rows older than this are eligible for the retention
/// sweep.
pub const DEFAULT_RETENTION_DAYS: i64 = 180;
