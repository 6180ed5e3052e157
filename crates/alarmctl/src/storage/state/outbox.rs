//! Outbox directory of alarm event documents.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use super::{parse_timestamp, StateStore};
use crate::entities::{AlarmPayload, AlarmStateRecord, AlarmStatus, ItemFailure, Listing};
use crate::errors::{ConsoleError, ConsoleResult};
use crate::storage::fs_util::{list_files, read_text};

const JSON_EXTENSION: &str = "json";
const FILE_PREFIX: &str = "alarmfw_";
const STATUS_LABELS: [AlarmStatus; 4] = [
    AlarmStatus::Problem,
    AlarmStatus::Ok,
    AlarmStatus::Error,
    AlarmStatus::Unknown,
];

/// Identity fields carried by a legacy outbox file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxFileName {
    pub timestamp: String,
    pub alarm_name: String,
    pub status: AlarmStatus,
    pub dedup_key: String,
}

/// Decode `alarmfw_<ts>_<alarm_name>_<STATUS>_<dedup_key>[.json]`.
///
/// `<ts>` may not contain `_`. The alarm name ends at the first
/// `_<STATUS>_` marker, so a name embedding an upper-case status label between
/// underscores is split early. Returns `None` for anything that does not follow
/// the convention.
pub fn decode_outbox_file_name(file_name: &str) -> Option<OutboxFileName> {
    let stem = file_name
        .strip_suffix(".json")
        .unwrap_or(file_name)
        .strip_prefix(FILE_PREFIX)?;
    let (timestamp, rest) = stem.split_once('_')?;
    if timestamp.is_empty() {
        return None;
    }

    let (pos, status, marker_len) = STATUS_LABELS
        .iter()
        .filter_map(|status| {
            let marker = format!("_{}_", status.as_str());
            rest.find(&marker).map(|pos| (pos, *status, marker.len()))
        })
        .min_by_key(|(pos, _, _)| *pos)?;

    let alarm_name = &rest[..pos];
    let dedup_key = &rest[pos + marker_len..];
    if alarm_name.is_empty() || dedup_key.is_empty() {
        return None;
    }

    Some(OutboxFileName {
        timestamp: timestamp.to_string(),
        alarm_name: alarm_name.to_string(),
        status,
        dedup_key: dedup_key.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct OutboxEvent {
    #[serde(default)]
    alarm_name: Option<String>,
    #[serde(default)]
    dedup_key: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    timestamp_utc: Option<Value>,
    #[serde(default)]
    sent_ts: Option<Value>,
    #[serde(default)]
    evidence: Option<Evidence>,
}

#[derive(Debug, Default, Deserialize)]
struct Evidence {
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    cluster: String,
    #[serde(default)]
    pods: Vec<Value>,
}

fn timestamp_of(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => parse_timestamp(s),
        #[allow(clippy::cast_possible_truncation)]
        Value::Number(n) => n
            .as_f64()
            .and_then(|secs| DateTime::from_timestamp(secs as i64, 0)),
        _ => None,
    }
}

fn timestamp_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// State read from the execution engine's outbox directory.
#[derive(Debug, Clone)]
pub struct OutboxStateStore {
    dir: PathBuf,
}

impl OutboxStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove every event document. Returns how many were deleted.
    pub async fn clear(&self) -> ConsoleResult<usize> {
        let files = list_files(&self.dir, JSON_EXTENSION).await?;
        for path in &files {
            fs::remove_file(path).await.map_err(|e| ConsoleError::FileWrite {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        info!(deleted = files.len(), "Outbox cleared");
        Ok(files.len())
    }

    async fn load(path: &Path) -> ConsoleResult<Option<AlarmStateRecord>> {
        let Some(text) = read_text(path).await? else {
            return Ok(None);
        };
        let event: OutboxEvent =
            serde_json::from_str(&text).map_err(|e| ConsoleError::Malformed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let legacy = decode_outbox_file_name(&file_name);

        let payload = event.evidence.map(|evidence| AlarmPayload {
            namespace: evidence.namespace,
            cluster: evidence.cluster,
            status: event
                .status
                .as_deref()
                .map_or(AlarmStatus::Unknown, AlarmStatus::from_label),
            timestamp: timestamp_text(event.timestamp_utc.as_ref()),
            resources: evidence.pods,
        });

        let alarm_name = event
            .alarm_name
            .filter(|n| !n.is_empty())
            .or_else(|| legacy.as_ref().map(|l| l.alarm_name.clone()))
            .unwrap_or_default();
        let has_scope = payload
            .as_ref()
            .is_some_and(|p| !p.namespace.is_empty() && !p.cluster.is_empty());
        if alarm_name.is_empty() && !has_scope {
            return Err(ConsoleError::Malformed {
                path: path.display().to_string(),
                reason: "event carries no alarm identity".to_string(),
            });
        }

        let last_status = event
            .status
            .as_deref()
            .map(AlarmStatus::from_label)
            .or_else(|| legacy.as_ref().map(|l| l.status))
            .unwrap_or_default();
        let dedup_key = event
            .dedup_key
            .filter(|k| !k.is_empty())
            .or_else(|| legacy.as_ref().map(|l| l.dedup_key.clone()))
            .unwrap_or_else(|| crate::storage::fs_util::stem(path));

        let last_change_ts = match timestamp_of(event.timestamp_utc.as_ref())
            .or_else(|| legacy.as_ref().and_then(|l| parse_timestamp(&l.timestamp)))
        {
            Some(ts) => ts,
            None => fs::metadata(path)
                .await?
                .modified()
                .map(DateTime::<Utc>::from)?,
        };

        Ok(Some(AlarmStateRecord {
            dedup_key,
            last_status,
            last_sent_ts: timestamp_of(event.sent_ts.as_ref()),
            last_change_ts,
            alarm_name,
            payload,
        }))
    }
}

#[async_trait]
impl StateStore for OutboxStateStore {
    fn store_type(&self) -> &'static str {
        "outbox"
    }

    async fn records(&self) -> ConsoleResult<Listing<AlarmStateRecord>> {
        let mut listing = Listing::default();
        for path in list_files(&self.dir, JSON_EXTENSION).await? {
            match Self::load(&path).await {
                Ok(Some(record)) => listing.items.push(record),
                Ok(None) => debug!(path = %path.display(), "Event vanished during scan"),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable outbox event");
                    listing
                        .failures
                        .push(ItemFailure::new(path.display().to_string(), e.to_string()));
                }
            }
        }
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_decode_typical_name() {
        let decoded = decode_outbox_file_name(
            "alarmfw_20250101T120000Z_ocp_pod_health__webstore__esy2-digital_PROBLEM_9f8e7d.json",
        )
        .unwrap();
        assert_eq!(decoded.timestamp, "20250101T120000Z");
        assert_eq!(decoded.alarm_name, "ocp_pod_health__webstore__esy2-digital");
        assert_eq!(decoded.status, AlarmStatus::Problem);
        assert_eq!(decoded.dedup_key, "9f8e7d");
    }

    #[test]
    fn test_decode_every_status() {
        for (label, status) in [
            ("PROBLEM", AlarmStatus::Problem),
            ("OK", AlarmStatus::Ok),
            ("ERROR", AlarmStatus::Error),
            ("UNKNOWN", AlarmStatus::Unknown),
        ] {
            let name = format!("alarmfw_1700000000_ocp_pod_health__a__b_{label}_k1");
            let decoded = decode_outbox_file_name(&name).unwrap();
            assert_eq!(decoded.status, status, "{label}");
            assert_eq!(decoded.alarm_name, "ocp_pod_health__a__b");
            assert_eq!(decoded.dedup_key, "k1");
        }
    }

    #[test]
    fn test_decode_underscores_in_segments() {
        let decoded =
            decode_outbox_file_name("alarmfw_1_ocp_pod_health__team_a__east_1_OK_dedup_with_parts.json")
                .unwrap();
        assert_eq!(decoded.alarm_name, "ocp_pod_health__team_a__east_1");
        assert_eq!(decoded.dedup_key, "dedup_with_parts");
    }

    #[test]
    fn test_decode_first_marker_wins() {
        let decoded = decode_outbox_file_name("alarmfw_1_name_ERROR_key_OK_tail").unwrap();
        assert_eq!(decoded.alarm_name, "name");
        assert_eq!(decoded.status, AlarmStatus::Error);
        assert_eq!(decoded.dedup_key, "key_OK_tail");
    }

    #[test]
    fn test_decode_rejects_other_names() {
        for name in [
            "",
            "alarmfw_",
            "alarmfw_123",
            "other_1_name_OK_key.json",
            "alarmfw__name_OK_key.json",
            "alarmfw_1_name_ok_key.json",
            "alarmfw_1_name_OK_.json",
            "alarmfw_1__OK_key.json",
            "alarmfw_1_name_RESOLVED_key.json",
        ] {
            assert!(decode_outbox_file_name(name).is_none(), "{name:?}");
        }
    }

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[tokio::test]
    async fn test_records_prefer_structured_fields() {
        let temp_dir = TempDir::new().unwrap();
        let store = OutboxStateStore::new(temp_dir.path().join("outbox"));
        write(
            store.dir(),
            "event-1.json",
            r#"{
                "alarm_name": "ocp_pod_health__billing__east",
                "dedup_key": "abc",
                "status": "PROBLEM",
                "timestamp_utc": "2025-01-01T12:00:00Z",
                "evidence": {"namespace": "billing", "cluster": "east", "pods": [{"name": "api-0"}]}
            }"#,
        );

        let listing = store.records().await.unwrap();
        assert!(listing.is_clean());
        let record = &listing.items[0];
        assert_eq!(record.dedup_key, "abc");
        assert_eq!(record.last_status, AlarmStatus::Problem);
        assert_eq!(record.last_change_ts.to_rfc3339(), "2025-01-01T12:00:00+00:00");
        let payload = record.payload.as_ref().unwrap();
        assert_eq!(payload.resources.len(), 1);
        assert_eq!(payload.timestamp.as_deref(), Some("2025-01-01T12:00:00Z"));
    }

    #[tokio::test]
    async fn test_records_fall_back_to_file_name() {
        let temp_dir = TempDir::new().unwrap();
        let store = OutboxStateStore::new(temp_dir.path());
        write(
            store.dir(),
            "alarmfw_1735732800_ocp_pod_health__billing__west_ERROR_d1.json",
            r#"{"status": "ERROR", "evidence": {"pods": []}}"#,
        );
        write(store.dir(), "garbage.json", "{not json");
        write(store.dir(), "anonymous.json", r#"{"status": "OK"}"#);

        let listing = store.records().await.unwrap();
        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.failures.len(), 2);

        let record = &listing.items[0];
        assert_eq!(record.alarm_name, "ocp_pod_health__billing__west");
        assert_eq!(record.dedup_key, "d1");
        assert_eq!(record.last_change_ts.timestamp(), 1_735_732_800);
        let scope = record.scope().unwrap();
        assert_eq!((scope.namespace.as_str(), scope.cluster.as_str()), ("billing", "west"));
    }

    #[tokio::test]
    async fn test_missing_dir_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = OutboxStateStore::new(temp_dir.path().join("outbox"));
        assert!(store.records().await.unwrap().items.is_empty());

        write(store.dir(), "a.json", r#"{"alarm_name": "x__y__z", "status": "OK"}"#);
        write(store.dir(), "b.json", r#"{"alarm_name": "x__y__w", "status": "PROBLEM"}"#);
        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.records().await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_recent_orders_filters_and_clamps() {
        let temp_dir = TempDir::new().unwrap();
        let store = OutboxStateStore::new(temp_dir.path());
        for (i, status) in ["OK", "PROBLEM", "PROBLEM"].iter().enumerate() {
            write(
                store.dir(),
                &format!("e{i}.json"),
                &format!(
                    r#"{{"alarm_name": "ocp_pod_health__n{i}__c", "status": "{status}", "timestamp_utc": "2025-01-0{}T00:00:00Z"}}"#,
                    i + 1
                ),
            );
        }

        let recent = store.recent(10, None).await.unwrap();
        let names: Vec<&str> = recent.iter().map(|r| r.alarm_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["ocp_pod_health__n2__c", "ocp_pod_health__n1__c", "ocp_pod_health__n0__c"]
        );

        let problems = store.recent(10, Some(AlarmStatus::Problem)).await.unwrap();
        assert_eq!(problems.len(), 2);

        assert_eq!(store.recent(0, None).await.unwrap().len(), 1);
    }
}
