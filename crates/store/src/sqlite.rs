// Saved calls in SQLite

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use callwatch_recon::normalize::apply_status;
use callwatch_recon::{CallStore, CancelToken, Category, ReconError, SavedCall};

use crate::error::StoreError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS saved_calls (
    sort_key TEXT PRIMARY KEY,          -- YYYY/MM/DD#id#category
    id TEXT NOT NULL,
    category TEXT NOT NULL,             -- police | fire
    reason TEXT NOT NULL,
    last_known_status TEXT NOT NULL,    -- lower-case
    received_at TEXT NOT NULL,          -- RFC 3339, UTC
    arrived_at TEXT,                    -- NULL until first on scene
    resolved_at TEXT,                   -- NULL until first resolved
    active_marker TEXT,                 -- '-' while open, NULL otherwise
    location TEXT NOT NULL,
    area TEXT NOT NULL,
    priority TEXT NOT NULL,
    house_number TEXT NOT NULL,
    street_name TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS saved_calls_active
    ON saved_calls (active_marker)
    WHERE active_marker IS NOT NULL;
"#;

const COLUMNS: &str = "sort_key, id, category, reason, last_known_status, received_at, \
     arrived_at, resolved_at, active_marker, location, area, priority, house_number, street_name";

const ACTIVE_MARKER: &str = "-";

/// SQLite-backed [`CallStore`].
///
/// The connection sits behind a mutex so one store can be shared by the
/// harvester's threads.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("opened {} (journal_mode={})", path.display(), mode);
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Calls carrying the activity marker, every category, oldest first.
    pub fn load_active(&self, cancel: &CancelToken) -> Result<Vec<SavedCall>, StoreError> {
        self.query(
            &format!(
                "SELECT {COLUMNS} FROM saved_calls \
                 WHERE active_marker IS NOT NULL \
                 ORDER BY received_at, sort_key"
            ),
            cancel,
        )
    }

    /// Every stored call, oldest first.
    pub fn all_calls(&self) -> Result<Vec<SavedCall>, StoreError> {
        self.query(
            &format!("SELECT {COLUMNS} FROM saved_calls ORDER BY received_at, sort_key"),
            &CancelToken::new(),
        )
    }

    pub fn get(&self, sort_key: &str) -> Result<Option<SavedCall>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM saved_calls WHERE sort_key = ?1"),
                params![sort_key],
                StoredRow::read,
            )
            .optional()?;
        row.map(StoredRow::into_call).transpose()
    }

    /// Put: write the whole record, replacing any row with the same key.
    pub fn put(&self, call: &SavedCall, cancel: &CancelToken) -> Result<(), StoreError> {
        let now = Utc::now();
        let call = prepare(call, now)?;
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO saved_calls ({COLUMNS}, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                call.sort_key,
                call.id,
                call.category.as_str(),
                call.reason,
                call.last_known_status,
                format_ts(&call.received),
                call.arrived.as_ref().map(format_ts),
                call.resolved.as_ref().map(format_ts),
                marker(call.active),
                call.location,
                call.area,
                call.priority,
                call.house_number,
                call.street_name,
                format_ts(&now),
            ],
        )?;
        log::debug!("put {} ({})", call.sort_key, call.last_known_status);
        Ok(())
    }

    /// Upsert by sort key: a missing row is inserted whole; an existing one
    /// takes the new status and marker, and keeps any milestone timestamp
    /// it already has.
    pub fn upsert_status(&self, call: &SavedCall, cancel: &CancelToken) -> Result<(), StoreError> {
        let now = Utc::now();
        let call = prepare(call, now)?;
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO saved_calls ({COLUMNS}, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15) \
                 ON CONFLICT (sort_key) DO UPDATE SET \
                     last_known_status = excluded.last_known_status, \
                     active_marker = excluded.active_marker, \
                     arrived_at = COALESCE(saved_calls.arrived_at, excluded.arrived_at), \
                     resolved_at = COALESCE(saved_calls.resolved_at, excluded.resolved_at), \
                     updated_at = excluded.updated_at"
            ),
            params![
                call.sort_key,
                call.id,
                call.category.as_str(),
                call.reason,
                call.last_known_status,
                format_ts(&call.received),
                call.arrived.as_ref().map(format_ts),
                call.resolved.as_ref().map(format_ts),
                marker(call.active),
                call.location,
                call.area,
                call.priority,
                call.house_number,
                call.street_name,
                format_ts(&now),
            ],
        )?;
        log::debug!("update {} -> {}", call.sort_key, call.last_known_status);
        Ok(())
    }

    fn query(&self, sql: &str, cancel: &CancelToken) -> Result<Vec<SavedCall>, StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], StoredRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(StoredRow::into_call).collect()
    }
}

impl CallStore for SqliteStore {
    type Error = StoreError;

    fn active_calls(&self, cancel: &CancelToken) -> Result<Vec<SavedCall>, StoreError> {
        self.load_active(cancel)
    }

    fn create(&self, call: &SavedCall, cancel: &CancelToken) -> Result<(), StoreError> {
        self.put(call, cancel)
    }

    fn update_status(&self, call: &SavedCall, cancel: &CancelToken) -> Result<(), StoreError> {
        self.upsert_status(call, cancel)
    }
}

/// Normalize and apply the status transition, so every written row has a
/// lower-case status, a derived key and a consistent activity marker.
fn prepare(call: &SavedCall, now: DateTime<Utc>) -> Result<SavedCall, StoreError> {
    apply_status(call.clone(), now).map_err(|e| match e {
        ReconError::UnknownStatus(status) => StoreError::UnknownStatus(status),
    })
}

fn marker(active: bool) -> Option<&'static str> {
    active.then_some(ACTIVE_MARKER)
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(column: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{} {:?}: {}", column, raw, e)))
}

/// Row as stored, before decoding.
struct StoredRow {
    sort_key: String,
    id: String,
    category: String,
    reason: String,
    last_known_status: String,
    received_at: String,
    arrived_at: Option<String>,
    resolved_at: Option<String>,
    active_marker: Option<String>,
    location: String,
    area: String,
    priority: String,
    house_number: String,
    street_name: String,
}

impl StoredRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sort_key: row.get(0)?,
            id: row.get(1)?,
            category: row.get(2)?,
            reason: row.get(3)?,
            last_known_status: row.get(4)?,
            received_at: row.get(5)?,
            arrived_at: row.get(6)?,
            resolved_at: row.get(7)?,
            active_marker: row.get(8)?,
            location: row.get(9)?,
            area: row.get(10)?,
            priority: row.get(11)?,
            house_number: row.get(12)?,
            street_name: row.get(13)?,
        })
    }

    fn into_call(self) -> Result<SavedCall, StoreError> {
        let category = Category::parse(&self.category).ok_or_else(|| {
            StoreError::Corrupt(format!("{}: category {:?}", self.sort_key, self.category))
        })?;
        Ok(SavedCall {
            received: parse_ts("received_at", &self.received_at)?,
            arrived: self
                .arrived_at
                .as_deref()
                .map(|raw| parse_ts("arrived_at", raw))
                .transpose()?,
            resolved: self
                .resolved_at
                .as_deref()
                .map(|raw| parse_ts("resolved_at", raw))
                .transpose()?,
            active: self.active_marker.is_some(),
            sort_key: self.sort_key,
            id: self.id,
            category,
            reason: self.reason,
            last_known_status: self.last_known_status,
            location: self.location,
            area: self.area,
            priority: self.priority,
            house_number: self.house_number,
            street_name: self.street_name,
        })
    }
}
