//! `alarm_state` table in the execution engine's SQLite database.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

use super::{parse_timestamp, StateStore};
use crate::entities::{AlarmPayload, AlarmStateRecord, AlarmStatus, ItemFailure, Listing};
use crate::errors::{ConsoleError, ConsoleResult};

const TABLE: &str = "alarm_state";
const REQUIRED_COLUMNS: [&str; 4] = ["dedup_key", "last_status", "last_sent_ts", "last_change_ts"];

/// State read straight from the engine's database, opened read-only.
#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    path: PathBuf,
}

impl SqliteStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sql_timestamp(value: &SqlValue) -> Option<DateTime<Utc>> {
    match value {
        SqlValue::Integer(secs) => DateTime::from_timestamp(*secs, 0),
        #[allow(clippy::cast_possible_truncation)]
        SqlValue::Real(secs) => DateTime::from_timestamp(*secs as i64, 0),
        SqlValue::Text(text) => parse_timestamp(text),
        _ => None,
    }
}

fn table_columns(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({TABLE})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Raw row before decoding; decode errors become per-row failures.
struct Row {
    dedup_key: String,
    last_status: String,
    last_sent_ts: SqlValue,
    last_change_ts: SqlValue,
    alarm_name: Option<String>,
    payload: Option<String>,
}

fn read_rows(path: &Path) -> ConsoleResult<Vec<Row>> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let columns = table_columns(&conn)?;
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|c| !columns.iter().any(|have| have == *c))
    {
        return Err(ConsoleError::StateUnavailable {
            reason: format!("table {TABLE} has no column '{missing}'"),
        });
    }
    let optional = |name: &str| {
        if columns.iter().any(|c| c == name) {
            name.to_string()
        } else {
            format!("NULL AS {name}")
        }
    };

    let sql = format!(
        "SELECT dedup_key, last_status, last_sent_ts, last_change_ts, {}, {} FROM {TABLE}",
        optional("alarm_name"),
        optional("payload"),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Row {
                dedup_key: row.get(0)?,
                last_status: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                last_sent_ts: row.get(2)?,
                last_change_ts: row.get(3)?,
                alarm_name: row.get(4)?,
                payload: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn decode(row: Row) -> Result<AlarmStateRecord, ItemFailure> {
    let failure = |reason: String| ItemFailure::new(format!("{TABLE}/{}", row.dedup_key), reason);

    let last_change_ts = sql_timestamp(&row.last_change_ts)
        .ok_or_else(|| failure("last_change_ts is not a timestamp".to_string()))?;
    let payload = match row.payload.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(text) => Some(
            serde_json::from_str::<AlarmPayload>(text)
                .map_err(|e| failure(format!("payload: {e}")))?,
        ),
        None => None,
    };

    Ok(AlarmStateRecord {
        last_status: AlarmStatus::from_label(&row.last_status),
        last_sent_ts: sql_timestamp(&row.last_sent_ts),
        last_change_ts,
        alarm_name: row.alarm_name.clone().unwrap_or_default(),
        payload,
        dedup_key: row.dedup_key,
    })
}

#[async_trait]
impl StateStore for SqliteStateStore {
    fn store_type(&self) -> &'static str {
        "sqlite"
    }

    async fn records(&self) -> ConsoleResult<Listing<AlarmStateRecord>> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            debug!(path = %self.path.display(), "State database not created yet");
            return Ok(Listing::default());
        }

        let path = self.path.clone();
        let rows = tokio::task::spawn_blocking(move || read_rows(&path))
            .await
            .map_err(|e| ConsoleError::StateUnavailable {
                reason: format!("state reader panicked: {e}"),
            })??;

        let mut listing = Listing::default();
        for row in rows {
            match decode(row) {
                Ok(record) => listing.items.push(record),
                Err(failure) => {
                    warn!(item = %failure.path, reason = %failure.reason, "Skipping undecodable state row");
                    listing.failures.push(failure);
                }
            }
        }
        Ok(listing)
    }
}
