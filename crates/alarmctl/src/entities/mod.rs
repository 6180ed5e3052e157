//! Core data structures for the operations console.

mod alarm;
mod check;
mod cluster;
mod listing;
mod names;
mod namespace;
mod run;

pub use alarm::{AlarmPayload, AlarmStateRecord, AlarmStatus, MonitorReport, MonitorSnapshot, ScopeKey};
pub use check::{
    Channel, CheckIdentity, CheckParams, CheckSpec, GeneratedDocument, NotificationRoute,
    DEFAULT_TIMEOUT_SECS, POD_HEALTH_CHECK_TYPE,
};
pub use cluster::{ClusterDefinition, ClusterView};
pub use listing::{ItemFailure, Listing};
pub use names::{validate_name, IDENTITY_DELIMITER};
pub use namespace::{normalize_clusters, NamespaceDefinition};
pub(crate) use namespace::{DEFAULT_ALERT_KEY, DEFAULT_SEVERITY};
pub use run::{JobStatus, RunOutcome};
