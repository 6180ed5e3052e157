//! Alarm state records and monitor views.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::check::CheckIdentity;

/// Last reported status of an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmStatus {
    Problem,
    Ok,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

impl AlarmStatus {
    /// Parse a status label case-insensitively; unrecognized labels are `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "PROBLEM" => Self::Problem,
            "OK" => Self::Ok,
            "ERROR" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Whether the status represents an active issue worth surfacing.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Problem | Self::Error)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Problem => "PROBLEM",
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(namespace, cluster)` pair. Orders by namespace, then cluster.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub namespace: String,
    pub cluster: String,
}

impl ScopeKey {
    pub fn new(namespace: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            cluster: cluster.into(),
        }
    }
}

/// Structured snapshot attached to an alarm by the execution engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmPayload {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub status: AlarmStatus,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Affected sub-resources (pods for pod health checks).
    #[serde(default, alias = "pods")]
    pub resources: Vec<Value>,
}

/// One row of the external alarm state table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmStateRecord {
    pub dedup_key: String,
    pub last_status: AlarmStatus,
    pub last_sent_ts: Option<DateTime<Utc>>,
    pub last_change_ts: DateTime<Utc>,
    pub alarm_name: String,
    pub payload: Option<AlarmPayload>,
}

impl AlarmStateRecord {
    /// The `(namespace, cluster)` this record belongs to.
    ///
    /// The payload is authoritative; the alarm name is only decoded when the
    /// payload does not carry both fields.
    pub fn scope(&self) -> Option<ScopeKey> {
        if let Some(payload) = &self.payload {
            if !payload.namespace.is_empty() && !payload.cluster.is_empty() {
                return Some(ScopeKey::new(&payload.namespace, &payload.cluster));
            }
        }
        CheckIdentity::parse(&self.alarm_name).map(|id| ScopeKey::new(id.namespace, id.cluster))
    }
}

/// Latest known state of one `(namespace, cluster)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub namespace: String,
    pub cluster: String,
    pub status: AlarmStatus,
    pub timestamp: Option<String>,
    pub last_change_ts: DateTime<Utc>,
    pub alarm_name: String,
    pub dedup_key: String,
    pub resources: Vec<Value>,
}

impl MonitorSnapshot {
    pub(crate) fn from_record(scope: ScopeKey, record: AlarmStateRecord) -> Self {
        let (timestamp, resources) = record
            .payload
            .map(|p| (p.timestamp, p.resources))
            .unwrap_or_default();
        Self {
            namespace: scope.namespace,
            cluster: scope.cluster,
            status: record.last_status,
            timestamp,
            last_change_ts: record.last_change_ts,
            alarm_name: record.alarm_name,
            dedup_key: record.dedup_key,
            resources,
        }
    }
}

/// Snapshots plus whether the state source could be read at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorReport {
    pub snapshots: Vec<MonitorSnapshot>,
    pub state_available: bool,
}
