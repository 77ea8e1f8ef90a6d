//! SQLite-backed implementation of the calendar persistence ports.
//!
//! One pooled store implements all three repository ports so the aggregator
//! and the mirror share a single persistence contract. Event writes are
//! upserts keyed by `(tutor_id, provider, provider_event_id)`; deletion is
//! soft (`deleted_at`), and only the retention sweep removes rows
//! physically.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Row, ToSql};
use tracing::{debug, instrument};
use tutorlane_core::{BookingLinkRepository, ConnectionRepository, EventCacheRepository};
use tutorlane_domain::{
    BookingCalendarLink, CachedCalendarEvent, CalendarConnection, CalendarProviderKind,
    EventStatus, Result, SyncStatus, TimeWindow, TutorlaneError,
};

use crate::errors::InfraError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS calendar_connections (
    id TEXT PRIMARY KEY,
    tutor_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    provider_account TEXT NOT NULL,
    access_token_enc TEXT NOT NULL,
    refresh_token_enc TEXT,
    access_token_expires_at INTEGER,
    status TEXT NOT NULL DEFAULT 'idle',
    sync_enabled INTEGER NOT NULL DEFAULT 1,
    last_synced_at INTEGER,
    last_error TEXT,
    UNIQUE(tutor_id, provider, provider_account)
);

CREATE TABLE IF NOT EXISTS cached_calendar_events (
    id TEXT PRIMARY KEY,
    tutor_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    provider_account TEXT NOT NULL,
    provider_event_id TEXT NOT NULL,
    calendar_id TEXT NOT NULL,
    start_ts INTEGER NOT NULL,
    end_ts INTEGER NOT NULL,
    summary TEXT,
    status TEXT NOT NULL DEFAULT 'confirmed',
    recurrence_master_id TEXT,
    is_all_day INTEGER NOT NULL DEFAULT 0,
    deleted_at INTEGER,
    last_seen_at INTEGER NOT NULL,
    UNIQUE(tutor_id, provider, provider_event_id)
);
CREATE INDEX IF NOT EXISTS idx_cached_events_range
    ON cached_calendar_events(tutor_id, start_ts, end_ts);

CREATE TABLE IF NOT EXISTS booking_calendar_links (
    id TEXT PRIMARY KEY,
    booking_id TEXT NOT NULL,
    tutor_id TEXT NOT NULL,
    connection_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    provider_event_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE(booking_id, connection_id)
);
CREATE INDEX IF NOT EXISTS idx_links_booking ON booking_calendar_links(booking_id);
";

const EVENT_COLUMNS: &str = "id, tutor_id, provider, provider_account, provider_event_id,
       calendar_id, start_ts, end_ts, summary, status, recurrence_master_id,
       is_all_day, deleted_at, last_seen_at";

/// Pooled SQLite store for connections, cached events, and booking links.
pub struct SqliteCalendarStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteCalendarStore {
    /// Open (creating when absent) the store at `path` and ensure the
    /// schema exists.
    pub fn open(path: &Path, pool_size: u32) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool =
            Pool::builder().max_size(pool_size).build(manager).map_err(InfraError::from)?;
        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(SCHEMA).map_err(InfraError::from)?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| TutorlaneError::Database(format!("connection pool error: {e}")))
    }

    /// Insert or replace a connection row. Connection rows are created by
    /// the OAuth consent collaborator; this entry point exists for that
    /// collaborator and for tests.
    pub fn insert_connection(&self, connection: &CalendarConnection) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO calendar_connections (
                    id, tutor_id, provider, provider_account, access_token_enc,
                    refresh_token_enc, access_token_expires_at, status, sync_enabled,
                    last_synced_at, last_error
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(tutor_id, provider, provider_account) DO UPDATE SET
                    access_token_enc = excluded.access_token_enc,
                    refresh_token_enc = excluded.refresh_token_enc,
                    access_token_expires_at = excluded.access_token_expires_at,
                    status = excluded.status,
                    sync_enabled = excluded.sync_enabled",
                [
                    &connection.id as &dyn ToSql,
                    &connection.tutor_id,
                    &connection.provider.as_str(),
                    &connection.provider_account,
                    &connection.access_token_enc,
                    &connection.refresh_token_enc,
                    &connection.access_token_expires_at.map(|t| t.timestamp()),
                    &connection.status.as_str(),
                    &connection.sync_enabled,
                    &connection.last_synced_at.map(|t| t.timestamp()),
                    &connection.last_error,
                ]
                .as_ref(),
            )
            .map_err(InfraError::from)?;
        Ok(())
    }
}

fn from_ts(value: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(value, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse a TEXT column into a domain enum, surfacing bad data as a
/// conversion failure instead of a panic.
fn parse_column<T>(value: String, index: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = TutorlaneError>,
{
    value.parse().map_err(|err: TutorlaneError| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })
}

fn connection_from_row(row: &Row<'_>) -> rusqlite::Result<CalendarConnection> {
    Ok(CalendarConnection {
        id: row.get(0)?,
        tutor_id: row.get(1)?,
        provider: parse_column::<CalendarProviderKind>(row.get(2)?, 2)?,
        provider_account: row.get(3)?,
        access_token_enc: row.get(4)?,
        refresh_token_enc: row.get(5)?,
        access_token_expires_at: row.get::<_, Option<i64>>(6)?.map(from_ts),
        status: parse_column::<SyncStatus>(row.get(7)?, 7)?,
        sync_enabled: row.get(8)?,
        last_synced_at: row.get::<_, Option<i64>>(9)?.map(from_ts),
        last_error: row.get(10)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<CachedCalendarEvent> {
    Ok(CachedCalendarEvent {
        id: row.get(0)?,
        tutor_id: row.get(1)?,
        provider: parse_column::<CalendarProviderKind>(row.get(2)?, 2)?,
        provider_account: row.get(3)?,
        provider_event_id: row.get(4)?,
        calendar_id: row.get(5)?,
        start: from_ts(row.get(6)?),
        end: from_ts(row.get(7)?),
        summary: row.get(8)?,
        status: parse_column::<EventStatus>(row.get(9)?, 9)?,
        recurrence_master_id: row.get(10)?,
        is_all_day: row.get(11)?,
        deleted_at: row.get::<_, Option<i64>>(12)?.map(from_ts),
        last_seen_at: from_ts(row.get(13)?),
    })
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<BookingCalendarLink> {
    Ok(BookingCalendarLink {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        tutor_id: row.get(2)?,
        connection_id: row.get(3)?,
        provider: parse_column::<CalendarProviderKind>(row.get(4)?, 4)?,
        provider_event_id: row.get(5)?,
        created_at: from_ts(row.get(6)?),
    })
}

#[async_trait]
impl ConnectionRepository for SqliteCalendarStore {
    #[instrument(skip(self))]
    async fn connections_for_tutor(&self, tutor_id: &str) -> Result<Vec<CalendarConnection>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, tutor_id, provider, provider_account, access_token_enc,
                        refresh_token_enc, access_token_expires_at, status, sync_enabled,
                        last_synced_at, last_error
                 FROM calendar_connections
                 WHERE tutor_id = ?1
                 ORDER BY provider, provider_account",
            )
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map([&tutor_id as &dyn ToSql].as_ref(), connection_from_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        Ok(rows)
    }

    #[instrument(skip(self, access_token_enc, refresh_token_enc))]
    async fn store_rotated_tokens(
        &self,
        connection_id: &str,
        access_token_enc: &str,
        expires_at: DateTime<Utc>,
        refresh_token_enc: Option<&str>,
    ) -> Result<()> {
        // Single UPDATE keeps per-connection token writes atomic.
        self.conn()?
            .execute(
                "UPDATE calendar_connections
                 SET access_token_enc = ?1,
                     access_token_expires_at = ?2,
                     refresh_token_enc = COALESCE(?3, refresh_token_enc),
                     last_error = NULL
                 WHERE id = ?4",
                [
                    &access_token_enc as &dyn ToSql,
                    &expires_at.timestamp(),
                    &refresh_token_enc,
                    &connection_id,
                ]
                .as_ref(),
            )
            .map_err(InfraError::from)?;

        debug!(connection_id, "persisted rotated tokens");
        Ok(())
    }

    #[instrument(skip(self, error))]
    async fn record_status(
        &self,
        connection_id: &str,
        status: SyncStatus,
        error: Option<&str>,
    ) -> Result<()> {
        self.conn()?
            .execute(
                "UPDATE calendar_connections SET status = ?1, last_error = ?2 WHERE id = ?3",
                [&status.as_str() as &dyn ToSql, &error, &connection_id].as_ref(),
            )
            .map_err(InfraError::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_synced(&self, connection_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn()?
            .execute(
                "UPDATE calendar_connections SET last_synced_at = ?1 WHERE id = ?2",
                [&at.timestamp() as &dyn ToSql, &connection_id].as_ref(),
            )
            .map_err(InfraError::from)?;
        Ok(())
    }
}

#[async_trait]
impl EventCacheRepository for SqliteCalendarStore {
    #[instrument(skip(self, events), fields(count = events.len()))]
    async fn upsert_events(&self, events: &[CachedCalendarEvent]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(InfraError::from)?;

        for event in events {
            tx.execute(
                "INSERT INTO cached_calendar_events (
                    id, tutor_id, provider, provider_account, provider_event_id,
                    calendar_id, start_ts, end_ts, summary, status,
                    recurrence_master_id, is_all_day, deleted_at, last_seen_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL, ?13)
                ON CONFLICT(tutor_id, provider, provider_event_id) DO UPDATE SET
                    provider_account = excluded.provider_account,
                    calendar_id = excluded.calendar_id,
                    start_ts = excluded.start_ts,
                    end_ts = excluded.end_ts,
                    summary = excluded.summary,
                    status = excluded.status,
                    recurrence_master_id = excluded.recurrence_master_id,
                    is_all_day = excluded.is_all_day,
                    deleted_at = NULL,
                    last_seen_at = excluded.last_seen_at",
                [
                    &event.id as &dyn ToSql,
                    &event.tutor_id,
                    &event.provider.as_str(),
                    &event.provider_account,
                    &event.provider_event_id,
                    &event.calendar_id,
                    &event.start.timestamp(),
                    &event.end.timestamp(),
                    &event.summary,
                    &event.status.as_str(),
                    &event.recurrence_master_id,
                    &event.is_all_day,
                    &event.last_seen_at.timestamp(),
                ]
                .as_ref(),
            )
            .map_err(InfraError::from)?;
        }

        tx.commit().map_err(InfraError::from)?;
        Ok(())
    }

    async fn events_for_account(
        &self,
        tutor_id: &str,
        provider: CalendarProviderKind,
        provider_account: &str,
        range: &TimeWindow,
    ) -> Result<Vec<CachedCalendarEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS}
                 FROM cached_calendar_events
                 WHERE tutor_id = ?1 AND provider = ?2 AND provider_account = ?3
                   AND deleted_at IS NULL
                   AND start_ts < ?4 AND end_ts > ?5
                 ORDER BY start_ts ASC"
            ))
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map(
                [
                    &tutor_id as &dyn ToSql,
                    &provider.as_str(),
                    &provider_account,
                    &range.end.timestamp(),
                    &range.start.timestamp(),
                ]
                .as_ref(),
                event_from_row,
            )
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        Ok(rows)
    }

    async fn events_for_tutor(
        &self,
        tutor_id: &str,
        range: &TimeWindow,
    ) -> Result<Vec<CachedCalendarEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EVENT_COLUMNS}
                 FROM cached_calendar_events
                 WHERE tutor_id = ?1 AND deleted_at IS NULL
                   AND start_ts < ?2 AND end_ts > ?3
                 ORDER BY start_ts ASC"
            ))
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map(
                [&tutor_id as &dyn ToSql, &range.end.timestamp(), &range.start.timestamp()]
                    .as_ref(),
                event_from_row,
            )
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        Ok(rows)
    }

    async fn find_event(
        &self,
        tutor_id: &str,
        provider: CalendarProviderKind,
        provider_event_id: &str,
    ) -> Result<Option<CachedCalendarEvent>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!(
                "SELECT {EVENT_COLUMNS}
                 FROM cached_calendar_events
                 WHERE tutor_id = ?1 AND provider = ?2 AND provider_event_id = ?3
                   AND deleted_at IS NULL"
            ),
            [&tutor_id as &dyn ToSql, &provider.as_str(), &provider_event_id].as_ref(),
            event_from_row,
        );

        match result {
            Ok(event) => Ok(Some(event)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(InfraError::from(err).into()),
        }
    }

    #[instrument(skip(self))]
    async fn retire_event(
        &self,
        tutor_id: &str,
        provider: CalendarProviderKind,
        provider_event_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn()?
            .execute(
                "UPDATE cached_calendar_events
                 SET status = 'cancelled', deleted_at = ?1
                 WHERE tutor_id = ?2 AND provider = ?3 AND provider_event_id = ?4
                   AND deleted_at IS NULL",
                [&at.timestamp() as &dyn ToSql, &tutor_id, &provider.as_str(), &provider_event_id]
                    .as_ref(),
            )
            .map_err(InfraError::from)?;

        debug!(tutor_id, provider_event_id, "retired cached event");
        Ok(())
    }

    async fn find_legacy_candidate(
        &self,
        tutor_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        title_prefix: &str,
    ) -> Result<Option<CachedCalendarEvent>> {
        let conn = self.conn()?;
        // Exact-prefix comparison via substr avoids LIKE wildcard surprises
        // in booking titles.
        let result = conn.query_row(
            &format!(
                "SELECT {EVENT_COLUMNS}
                 FROM cached_calendar_events e
                 WHERE e.tutor_id = ?1 AND e.deleted_at IS NULL
                   AND e.start_ts = ?2 AND e.end_ts = ?3
                   AND e.summary IS NOT NULL
                   AND substr(e.summary, 1, length(?4)) = ?4
                   AND NOT EXISTS (
                       SELECT 1 FROM booking_calendar_links l
                       WHERE l.tutor_id = e.tutor_id
                         AND l.provider = e.provider
                         AND l.provider_event_id = e.provider_event_id
                   )
                 ORDER BY e.last_seen_at DESC
                 LIMIT 1"
            ),
            [&tutor_id as &dyn ToSql, &start.timestamp(), &end.timestamp(), &title_prefix]
                .as_ref(),
            event_from_row,
        );

        match result {
            Ok(event) => Ok(Some(event)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(InfraError::from(err).into()),
        }
    }

    #[instrument(skip(self))]
    async fn purge_deleted_older_than(&self, days: i64) -> Result<usize> {
        let cutoff = Utc::now().timestamp() - days * 24 * 60 * 60;
        let purged = self
            .conn()?
            .execute(
                "DELETE FROM cached_calendar_events
                 WHERE deleted_at IS NOT NULL AND deleted_at < ?1",
                [&cutoff as &dyn ToSql].as_ref(),
            )
            .map_err(InfraError::from)?;

        debug!(days, purged, "purged soft-deleted events");
        Ok(purged)
    }
}

#[async_trait]
impl BookingLinkRepository for SqliteCalendarStore {
    async fn links_for_booking(&self, booking_id: &str) -> Result<Vec<BookingCalendarLink>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, booking_id, tutor_id, connection_id, provider,
                        provider_event_id, created_at
                 FROM booking_calendar_links
                 WHERE booking_id = ?1
                 ORDER BY created_at ASC",
            )
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map([&booking_id as &dyn ToSql].as_ref(), link_from_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        Ok(rows)
    }

    #[instrument(skip(self, link), fields(booking_id = %link.booking_id))]
    async fn insert_link(&self, link: &BookingCalendarLink) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO booking_calendar_links (
                    id, booking_id, tutor_id, connection_id, provider,
                    provider_event_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(booking_id, connection_id) DO UPDATE SET
                    id = excluded.id,
                    provider = excluded.provider,
                    provider_event_id = excluded.provider_event_id,
                    created_at = excluded.created_at",
                [
                    &link.id as &dyn ToSql,
                    &link.booking_id,
                    &link.tutor_id,
                    &link.connection_id,
                    &link.provider.as_str(),
                    &link.provider_event_id,
                    &link.created_at.timestamp(),
                ]
                .as_ref(),
            )
            .map_err(InfraError::from)?;
        Ok(())
    }

    async fn remove_link(&self, link_id: &str) -> Result<()> {
        self.conn()?
            .execute(
                "DELETE FROM booking_calendar_links WHERE id = ?1",
                [&link_id as &dyn ToSql].as_ref(),
            )
            .map_err(InfraError::from)?;
        Ok(())
    }
}
