//! Read-only access to the alarm state written by the execution engine.

mod outbox;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::entities::{AlarmStateRecord, AlarmStatus, Listing};
use crate::errors::ConsoleResult;

pub use outbox::{decode_outbox_file_name, OutboxFileName, OutboxStateStore};
pub use sqlite::SqliteStateStore;

/// Largest page `recent` returns.
pub const MAX_RECENT: usize = 500;

/// Parse the timestamp shapes the execution engine has been seen to write:
/// RFC 3339, compact `20250101T120000Z`, naive ISO (taken as UTC) and epoch
/// seconds.
pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y%m%dT%H%M%SZ", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    #[allow(clippy::cast_possible_truncation)]
    text.parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite())
        .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
}

/// Source of alarm state records.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Backend identifier used in logs.
    fn store_type(&self) -> &'static str;

    /// Every readable record, plus the entries that could not be decoded.
    ///
    /// A backend that does not exist yet has no records. Fails only when the
    /// backend exists but cannot be read at all.
    async fn records(&self) -> ConsoleResult<Listing<AlarmStateRecord>>;

    /// Newest records first, optionally restricted to one status.
    ///
    /// `limit` is clamped to `1..=MAX_RECENT`.
    async fn recent(
        &self,
        limit: usize,
        status: Option<AlarmStatus>,
    ) -> ConsoleResult<Vec<AlarmStateRecord>> {
        let mut records: Vec<AlarmStateRecord> = self
            .records()
            .await?
            .into_items()
            .into_iter()
            .filter(|r| status.is_none_or(|s| r.last_status == s))
            .collect();
        records.sort_by(|a, b| b.last_change_ts.cmp(&a.last_change_ts));
        records.truncate(limit.clamp(1, MAX_RECENT));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_shapes() {
        let expected = DateTime::from_timestamp(1_735_732_800, 0);
        for text in [
            "2025-01-01T12:00:00Z",
            "2025-01-01T14:00:00+02:00",
            "20250101T120000Z",
            "2025-01-01T12:00:00",
            "2025-01-01 12:00:00.000",
            "1735732800",
            "1735732800.25",
        ] {
            assert_eq!(parse_timestamp(text), expected, "{text}");
        }
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
