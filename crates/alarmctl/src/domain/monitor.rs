//! Topology reconciler: declared topology against observed alarm state.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::entities::{AlarmStateRecord, MonitorReport, MonitorSnapshot, ScopeKey};
use crate::errors::ConsoleResult;
use crate::storage::{GeneratedStore, StateStore, TopologyCheck};

/// Most recent record per `(namespace, cluster)`.
///
/// Records without a recognizable scope are dropped. On equal timestamps the
/// first record seen wins.
pub fn latest_per_scope<I>(records: I) -> BTreeMap<ScopeKey, AlarmStateRecord>
where
    I: IntoIterator<Item = AlarmStateRecord>,
{
    let mut latest: BTreeMap<ScopeKey, AlarmStateRecord> = BTreeMap::new();
    for record in records {
        let Some(scope) = record.scope() else {
            debug!(alarm = %record.alarm_name, "Record has no namespace/cluster scope");
            continue;
        };
        match latest.get(&scope) {
            Some(current) if current.last_change_ts >= record.last_change_ts => {}
            _ => {
                latest.insert(scope, record);
            }
        }
    }
    latest
}

/// Active snapshots matching the filters, sorted by `(namespace, cluster)`.
///
/// Each filter is an exact match on its own field; an absent filter matches
/// everything.
pub fn select_snapshots(
    latest: BTreeMap<ScopeKey, AlarmStateRecord>,
    cluster: Option<&str>,
    namespace: Option<&str>,
) -> Vec<MonitorSnapshot> {
    latest
        .into_iter()
        .filter(|(scope, _)| cluster.is_none_or(|c| scope.cluster == c))
        .filter(|(scope, _)| namespace.is_none_or(|n| scope.namespace == n))
        .filter(|(_, record)| record.last_status.is_active())
        .map(|(scope, record)| MonitorSnapshot::from_record(scope, record))
        .collect()
}

/// Answers which pairs exist and which of them are currently failing.
#[derive(Clone)]
pub struct TopologyReconciler {
    generated: GeneratedStore,
    state: Arc<dyn StateStore>,
}

impl TopologyReconciler {
    pub fn new(generated: GeneratedStore, state: Arc<dyn StateStore>) -> Self {
        Self { generated, state }
    }

    /// Pairs declared by every enabled check in the generated documents,
    /// whatever their check type.
    pub async fn topology_pairs(&self) -> ConsoleResult<BTreeSet<ScopeKey>> {
        let listing = self.generated.topology_checks().await?;
        Ok(listing
            .items
            .iter()
            .filter(|check| check.enabled)
            .flat_map(TopologyCheck::pairs)
            .collect())
    }

    /// Latest record per pair, or `None` when the state source cannot be read.
    async fn latest(&self) -> Option<BTreeMap<ScopeKey, AlarmStateRecord>> {
        match self.state.records().await {
            Ok(listing) => Some(latest_per_scope(listing.items)),
            Err(e) => {
                warn!(store = self.state.store_type(), error = %e, "Alarm state unavailable");
                None
            }
        }
    }

    /// Pairs that have at least one state record. Empty if state is unavailable.
    pub async fn observed_pairs(&self) -> BTreeSet<ScopeKey> {
        self.latest()
            .await
            .map(|latest| latest.into_keys().collect())
            .unwrap_or_default()
    }

    /// Active (PROBLEM or ERROR) snapshots, newest record per pair.
    ///
    /// An unavailable state source yields an empty result; use
    /// [`report`](Self::report) to tell the two apart.
    pub async fn snapshots(
        &self,
        cluster: Option<&str>,
        namespace: Option<&str>,
    ) -> Vec<MonitorSnapshot> {
        self.report(cluster, namespace).await.snapshots
    }

    /// Like [`snapshots`](Self::snapshots) but also says whether state was read.
    pub async fn report(&self, cluster: Option<&str>, namespace: Option<&str>) -> MonitorReport {
        match self.latest().await {
            Some(latest) => MonitorReport {
                snapshots: select_snapshots(latest, cluster, namespace),
                state_available: true,
            },
            None => MonitorReport {
                snapshots: Vec::new(),
                state_available: false,
            },
        }
    }

    async fn known_pairs(&self) -> ConsoleResult<BTreeSet<ScopeKey>> {
        let mut pairs = self.topology_pairs().await?;
        pairs.extend(self.observed_pairs().await);
        Ok(pairs)
    }

    /// Namespaces from topology and state, sorted and de-duplicated.
    pub async fn all_namespaces(&self) -> ConsoleResult<Vec<String>> {
        let names: BTreeSet<String> = self
            .known_pairs()
            .await?
            .into_iter()
            .map(|p| p.namespace)
            .collect();
        Ok(names.into_iter().collect())
    }

    /// Clusters from topology and state, sorted and de-duplicated.
    pub async fn all_clusters(&self) -> ConsoleResult<Vec<String>> {
        let names: BTreeSet<String> = self
            .known_pairs()
            .await?
            .into_iter()
            .map(|p| p.cluster)
            .collect();
        Ok(names.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AlarmPayload, AlarmStatus, Listing};
    use crate::errors::ConsoleError;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use tempfile::TempDir;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn record(ns: &str, cl: &str, status: AlarmStatus, secs: i64) -> AlarmStateRecord {
        AlarmStateRecord {
            dedup_key: format!("{ns}-{cl}-{secs}"),
            last_status: status,
            last_sent_ts: None,
            last_change_ts: at(secs),
            alarm_name: format!("ocp_pod_health__{ns}__{cl}"),
            payload: Some(AlarmPayload {
                namespace: ns.to_string(),
                cluster: cl.to_string(),
                status,
                timestamp: None,
                resources: Vec::new(),
            }),
        }
    }

    struct FixedState(Vec<AlarmStateRecord>);

    #[async_trait]
    impl StateStore for FixedState {
        fn store_type(&self) -> &'static str {
            "fixed"
        }

        async fn records(&self) -> ConsoleResult<Listing<AlarmStateRecord>> {
            Ok(Listing {
                items: self.0.clone(),
                failures: Vec::new(),
            })
        }
    }

    struct BrokenState;

    #[async_trait]
    impl StateStore for BrokenState {
        fn store_type(&self) -> &'static str {
            "broken"
        }

        async fn records(&self) -> ConsoleResult<Listing<AlarmStateRecord>> {
            Err(ConsoleError::StateUnavailable {
                reason: "database is locked".to_string(),
            })
        }
    }

    fn reconciler(temp_dir: &TempDir, state: Arc<dyn StateStore>) -> TopologyReconciler {
        TopologyReconciler::new(
            GeneratedStore::new(temp_dir.path(), "ocp_pod_health.yaml"),
            state,
        )
    }

    #[test]
    fn test_latest_record_wins() {
        let latest = latest_per_scope(vec![
            record("billing", "east", AlarmStatus::Problem, 200),
            record("billing", "east", AlarmStatus::Error, 100),
        ]);
        assert_eq!(latest.len(), 1);
        assert_eq!(
            latest[&ScopeKey::new("billing", "east")].last_change_ts,
            at(200)
        );
    }

    #[test]
    fn test_unscoped_records_are_dropped() {
        let mut orphan = record("x", "y", AlarmStatus::Problem, 1);
        orphan.payload = None;
        orphan.alarm_name = "not-an-identity".to_string();
        assert!(latest_per_scope(vec![orphan]).is_empty());
    }

    #[test]
    fn test_filter_combinations() {
        let latest = || {
            latest_per_scope(vec![
                record("billing", "east", AlarmStatus::Problem, 1),
                record("billing", "west", AlarmStatus::Error, 1),
                record("web", "east", AlarmStatus::Problem, 1),
                record("web", "west", AlarmStatus::Ok, 1),
            ])
        };
        let pairs = |snaps: Vec<MonitorSnapshot>| {
            snaps
                .into_iter()
                .map(|s| format!("{}/{}", s.namespace, s.cluster))
                .collect::<Vec<_>>()
        };

        assert_eq!(
            pairs(select_snapshots(latest(), None, None)),
            vec!["billing/east", "billing/west", "web/east"]
        );
        assert_eq!(
            pairs(select_snapshots(latest(), Some("east"), None)),
            vec!["billing/east", "web/east"]
        );
        assert_eq!(
            pairs(select_snapshots(latest(), None, Some("billing"))),
            vec!["billing/east", "billing/west"]
        );
        assert_eq!(
            pairs(select_snapshots(latest(), Some("west"), Some("web"))),
            Vec::<String>::new()
        );
    }

    #[tokio::test]
    async fn test_newest_ok_hides_older_problem() {
        let temp_dir = TempDir::new().unwrap();
        let reconciler = reconciler(
            &temp_dir,
            Arc::new(FixedState(vec![
                record("billing", "east", AlarmStatus::Problem, 100),
                record("billing", "east", AlarmStatus::Ok, 200),
            ])),
        );
        assert!(reconciler.snapshots(None, None).await.is_empty());
        assert_eq!(
            reconciler.observed_pairs().await,
            BTreeSet::from([ScopeKey::new("billing", "east")])
        );
    }

    #[tokio::test]
    async fn test_unavailable_state_is_empty_but_reported() {
        let temp_dir = TempDir::new().unwrap();
        let reconciler = reconciler(&temp_dir, Arc::new(BrokenState));

        assert!(reconciler.snapshots(Some("east"), None).await.is_empty());
        assert!(reconciler.observed_pairs().await.is_empty());
        let report = reconciler.report(None, None).await;
        assert!(!report.state_available);
        assert!(report.snapshots.is_empty());
    }

    #[tokio::test]
    async fn test_all_namespaces_unions_topology_and_state() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("ocp_pod_health.yaml"),
            "checks:\n  - type: ocp_pod_health\n    params: {namespace: billing, cluster: east}\n",
        )
        .unwrap();
        let reconciler = reconciler(
            &temp_dir,
            Arc::new(FixedState(vec![record("web", "north", AlarmStatus::Ok, 1)])),
        );

        assert_eq!(reconciler.all_namespaces().await.unwrap(), vec!["billing", "web"]);
        assert_eq!(reconciler.all_clusters().await.unwrap(), vec!["east", "north"]);
    }
}
