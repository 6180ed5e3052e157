//! End-to-end tests of the console facade against a temporary installation.

use std::path::Path;
use std::sync::Arc;

use alarmctl::domain::{Console, SkipReason};
use alarmctl::entities::{Channel, ClusterDefinition, GeneratedDocument, NamespaceDefinition};
use alarmctl::errors::ConsoleError;
use alarmctl::storage::MASK;
use alarmctl::{AlarmStatus, ConsoleConfig, StateBackend};
use tempfile::TempDir;

fn console(temp_dir: &TempDir) -> Console {
    Console::new(ConsoleConfig::new(temp_dir.path()))
}

fn generated(temp_dir: &TempDir) -> GeneratedDocument {
    let path = temp_dir
        .path()
        .join("config/generated/ocp_pod_health.yaml");
    serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn billing() -> NamespaceDefinition {
    NamespaceDefinition::new("billing")
        .with_clusters(["east", "west"])
        .with_notifications(true, false)
}

fn write_event(dir: &Path, file: &str, event: &serde_json::Value) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(file), serde_json::to_string(event).unwrap()).unwrap();
}

fn event(ns: &str, cluster: &str, status: &str, ts: &str, key: &str) -> serde_json::Value {
    serde_json::json!({
        "alarm_name": format!("ocp_pod_health__{ns}__{cluster}"),
        "dedup_key": key,
        "status": status,
        "timestamp_utc": ts,
        "evidence": { "namespace": ns, "cluster": cluster, "pods": [{ "name": "api-0" }] }
    })
}

mod compile_tests {
    use super::*;

    #[tokio::test]
    async fn test_dangling_cluster_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let console = console(&temp_dir);

        console
            .upsert_cluster("east", ClusterDefinition::new("east", "https://east.example"))
            .await
            .unwrap();
        let count = console.upsert_namespace("billing", billing()).await.unwrap();
        assert_eq!(count, 1);

        let document = generated(&temp_dir);
        assert_eq!(document.checks.len(), 1);
        let check = &document.checks[0];
        assert_eq!(check.name, "ocp_pod_health__billing__east");
        assert_eq!(check.params.ocp_api, "https://east.example");
        assert_eq!(check.notify.primary, vec![Channel::Zabbix]);
        assert_eq!(
            check.notify.fallback,
            vec![Channel::DevSmtp, Channel::DevOutbox]
        );

        let report = console.compile_report().await.unwrap();
        assert_eq!(report.checks, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].cluster, "west");
        assert_eq!(report.skipped[0].reason, SkipReason::UndefinedCluster);
    }

    #[tokio::test]
    async fn test_compile_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let console = console(&temp_dir);
        console
            .upsert_cluster("east", ClusterDefinition::new("east", "https://east.example"))
            .await
            .unwrap();
        console
            .upsert_cluster("west", ClusterDefinition::new("west", "https://west.example"))
            .await
            .unwrap();
        console.upsert_namespace("billing", billing()).await.unwrap();

        let path = temp_dir
            .path()
            .join("config/generated/ocp_pod_health.yaml");
        let first = std::fs::read(&path).unwrap();
        assert_eq!(console.compile().await.unwrap(), 2);
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_disabled_namespace_emits_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let console = console(&temp_dir);
        console
            .upsert_cluster("east", ClusterDefinition::new("east", "https://east.example"))
            .await
            .unwrap();

        let count = console
            .upsert_namespace("billing", billing().with_enabled(false))
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(generated(&temp_dir)
            .checks
            .iter()
            .all(|c| c.params.namespace != "billing"));
    }

    #[tokio::test]
    async fn test_endpoint_indirection() {
        let temp_dir = TempDir::new().unwrap();
        let console = console(&temp_dir);
        console
            .upsert_namespace(
                "billing",
                NamespaceDefinition::new("billing").with_clusters(["east"]),
            )
            .await
            .unwrap();

        // Unset indirection: the cluster produces nothing.
        let count = console
            .upsert_cluster("east", ClusterDefinition::new("east", "${FOO}"))
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(console.env().get("OCP_API_EAST").await.unwrap().is_none());

        console.env().set("FOO", "https://x").await.unwrap();
        assert_eq!(console.compile().await.unwrap(), 1);
        assert_eq!(generated(&temp_dir).checks[0].params.ocp_api, "https://x");
    }

    #[tokio::test]
    async fn test_literal_endpoint_is_written_to_env() {
        let temp_dir = TempDir::new().unwrap();
        let console = console(&temp_dir);
        console
            .upsert_cluster(
                "esy2-digital",
                ClusterDefinition::new("esy2-digital", "https://api.esy2.example:6443"),
            )
            .await
            .unwrap();

        assert_eq!(
            console.env().get("OCP_API_ESY2_DIGITAL").await.unwrap().as_deref(),
            Some("https://api.esy2.example:6443")
        );
    }

    #[tokio::test]
    async fn test_delete_unknown_namespace() {
        let temp_dir = TempDir::new().unwrap();
        let err = console(&temp_dir)
            .delete_namespace("ghost")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_unknown_cluster() {
        let temp_dir = TempDir::new().unwrap();
        let err = console(&temp_dir).delete_cluster("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    async fn two_clusters_two_namespaces(console: &Console) {
        for (name, api) in [("east", "https://east.example"), ("west", "https://west.example")] {
            console
                .upsert_cluster(name, ClusterDefinition::new(name, api))
                .await
                .unwrap();
        }
        console.upsert_namespace("billing", billing()).await.unwrap();
        let count = console
            .upsert_namespace(
                "payments",
                NamespaceDefinition::new("payments").with_clusters(["east"]),
            )
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    fn check_names(temp_dir: &TempDir) -> Vec<String> {
        generated(temp_dir).checks.into_iter().map(|c| c.name).collect()
    }

    #[tokio::test]
    async fn test_delete_cluster_drops_its_checks() {
        let temp_dir = TempDir::new().unwrap();
        let console = console(&temp_dir);
        two_clusters_two_namespaces(&console).await;

        let count = console.delete_cluster("east").await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(check_names(&temp_dir), vec!["ocp_pod_health__billing__west"]);

        // billing still lists east; it is now skipped as undefined.
        let report = console.compile_report().await.unwrap();
        assert!(report
            .skipped
            .iter()
            .all(|s| s.cluster == "east" && s.reason == SkipReason::UndefinedCluster));
    }

    #[tokio::test]
    async fn test_delete_namespace_drops_its_checks() {
        let temp_dir = TempDir::new().unwrap();
        let console = console(&temp_dir);
        two_clusters_two_namespaces(&console).await;

        let count = console.delete_namespace("billing").await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(check_names(&temp_dir), vec!["ocp_pod_health__payments__east"]);

        assert_eq!(console.delete_namespace("payments").await.unwrap(), 0);
        assert!(generated(&temp_dir).checks.is_empty());
    }

    #[tokio::test]
    async fn test_line_break_in_value_cannot_inject_keys() {
        let temp_dir = TempDir::new().unwrap();
        let console = console(&temp_dir);
        console
            .upsert_cluster("east", ClusterDefinition::new("east", "https://east.example"))
            .await
            .unwrap();
        console.upsert_namespace("billing", billing()).await.unwrap();

        let mut injected = billing();
        injected.mail_to = "ops@example.com\nNAMESPACE_ENABLED=\"false\"".to_string();
        let err = console.upsert_namespace("billing", injected).await.unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidArgument { .. }));

        let stored = console.namespace_domain().get("billing").await.unwrap();
        assert!(stored.enabled);
        assert!(stored.mail_to.is_empty());
        assert_eq!(generated(&temp_dir).checks.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_cluster_leaves_nothing_behind() {
        let temp_dir = TempDir::new().unwrap();
        let console = console(&temp_dir);

        let err = console
            .upsert_cluster("east", ClusterDefinition::new("east", "https://east\n.example"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::InvalidArgument { .. }));
        assert!(console
            .cluster_domain()
            .get("east")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(console.env().get("OCP_API_EAST").await.unwrap().is_none());
    }
}

mod monitor_tests {
    use super::*;

    #[tokio::test]
    async fn test_latest_record_per_pair_wins() {
        let temp_dir = TempDir::new().unwrap();
        let outbox = temp_dir.path().join("state/outbox");
        write_event(
            &outbox,
            "old.json",
            &event("billing", "east", "PROBLEM", "2025-01-01T10:00:00Z", "k-old"),
        );
        write_event(
            &outbox,
            "new.json",
            &event("billing", "east", "PROBLEM", "2025-01-01T12:00:00Z", "k-new"),
        );

        let snapshots = console(&temp_dir).snapshots(Some("east"), None).await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].dedup_key, "k-new");
        assert_eq!(snapshots[0].resources.len(), 1);
    }

    #[tokio::test]
    async fn test_ok_records_are_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let outbox = temp_dir.path().join("state/outbox");
        write_event(
            &outbox,
            "a.json",
            &event("billing", "east", "OK", "2025-01-01T10:00:00Z", "k1"),
        );
        write_event(
            &outbox,
            "b.json",
            &event("payments", "west", "PROBLEM", "2025-01-01T10:00:00Z", "k2"),
        );

        let snapshots = console(&temp_dir).snapshots(None, None).await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].namespace, "payments");
        assert_eq!(snapshots[0].status, AlarmStatus::Problem);
    }

    #[tokio::test]
    async fn test_names_merge_topology_and_state() {
        let temp_dir = TempDir::new().unwrap();
        let console = console(&temp_dir);
        console
            .upsert_cluster("east", ClusterDefinition::new("east", "https://east.example"))
            .await
            .unwrap();
        console.upsert_namespace("billing", billing()).await.unwrap();
        write_event(
            &temp_dir.path().join("state/outbox"),
            "a.json",
            &event("payments", "north", "ERROR", "2025-01-01T10:00:00Z", "k1"),
        );

        assert_eq!(console.namespaces().await.unwrap(), vec!["billing", "payments"]);
        assert_eq!(console.clusters().await.unwrap(), vec!["east", "north"]);
    }

    #[tokio::test]
    async fn test_sqlite_backend() {
        let temp_dir = TempDir::new().unwrap();
        let state_dir = temp_dir.path().join("state");
        std::fs::create_dir_all(&state_dir).unwrap();
        let conn = rusqlite::Connection::open(state_dir.join("alarmfw.sqlite")).unwrap();
        conn.execute_batch(
            "CREATE TABLE alarm_state (dedup_key TEXT PRIMARY KEY, last_status TEXT, \
             last_sent_ts REAL, last_change_ts REAL, alarm_name TEXT, payload TEXT);
             INSERT INTO alarm_state VALUES \
             ('k1', 'PROBLEM', NULL, 1735725600, 'ocp_pod_health__billing__east', NULL), \
             ('k2', 'OK', NULL, 1735729200, 'ocp_pod_health__billing__east', NULL);",
        )
        .unwrap();
        drop(conn);

        let mut config = ConsoleConfig::new(temp_dir.path());
        config.state_backend = StateBackend::Sqlite;
        let console = Console::new(config);

        let report = console.report(None, None).await;
        assert!(report.state_available);
        // The newer OK record supersedes the PROBLEM.
        assert!(report.snapshots.is_empty());

        let recent = console.state().recent(10, None).await.unwrap();
        assert_eq!(recent[0].dedup_key, "k2");
    }
}

mod editor_tests {
    use super::*;
    use alarmctl::domain::RunExecutor;
    use alarmctl::errors::ConsoleResult;
    use alarmctl::{JobStatus, RunOutcome};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_env_masking_and_mask_writes() {
        let temp_dir = TempDir::new().unwrap();
        let console = console(&temp_dir);
        let env = console.env();
        env.update([("OCP_TOKEN", "s3cret"), ("API_KEY", "k"), ("REGION", "eu")])
            .await
            .unwrap();

        let masked = env.list_masked().await.unwrap();
        assert_eq!(masked["OCP_TOKEN"], MASK);
        assert_eq!(masked["API_KEY"], MASK);
        assert_eq!(masked["REGION"], "eu");

        assert!(!env.set("OCP_TOKEN", MASK).await.unwrap());
        assert_eq!(env.get("OCP_TOKEN").await.unwrap().as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn test_cluster_view_reports_token() {
        let temp_dir = TempDir::new().unwrap();
        let console = console(&temp_dir);
        console
            .upsert_cluster("east", ClusterDefinition::new("east", "https://east.example"))
            .await
            .unwrap();
        assert!(!console.cluster_domain().get("east").await.unwrap().has_token);

        console.secrets().put("east", "sha256~abc\n").await.unwrap();
        let view = console.cluster_domain().get("east").await.unwrap();
        assert!(view.has_token);
        assert_eq!(view.api_endpoint, "https://east.example");
    }

    struct Instant;

    #[async_trait]
    impl RunExecutor for Instant {
        async fn execute(&self, config: &str) -> ConsoleResult<RunOutcome> {
            Ok(outcome(config, 2))
        }
    }

    struct Gated(Arc<Notify>);

    #[async_trait]
    impl RunExecutor for Gated {
        async fn execute(&self, config: &str) -> ConsoleResult<RunOutcome> {
            self.0.notified().await;
            Ok(outcome(config, 0))
        }
    }

    fn outcome(config: &str, exit_code: i32) -> RunOutcome {
        RunOutcome {
            config: config.to_string(),
            exit_code,
            stdout: String::new(),
            stderr: "boom".to_string(),
            duration_secs: 0.0,
            started_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_run_uses_configured_default() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = ConsoleConfig::new(temp_dir.path());
        config.run_config = "/config/run_nightly.yaml".to_string();
        let console = Console::with_executor(config, Arc::new(Instant));

        let outcome = console.run(None).await.unwrap();
        assert!(!outcome.succeeded());
        assert_eq!(outcome.config, "/config/run_nightly.yaml");
        assert_eq!(console.runs().status().await.unwrap().label(), "completed");

        // A finished run leaves the slot free.
        let again = console.run(Some("/config/run_local.yaml")).await.unwrap();
        assert_eq!(again.config, "/config/run_local.yaml");
    }

    #[tokio::test]
    async fn test_run_slot_is_shared_across_consoles() {
        let temp_dir = TempDir::new().unwrap();
        let gate = Arc::new(Notify::new());
        let first = Console::with_executor(
            ConsoleConfig::new(temp_dir.path()),
            Arc::new(Gated(gate.clone())),
        );
        let second = Console::with_executor(
            ConsoleConfig::new(temp_dir.path()),
            Arc::new(Gated(gate.clone())),
        );

        let handle = first.runs().spawn("/config/run_local.yaml").await.unwrap();
        let err = second
            .runs()
            .spawn("/config/run_local.yaml")
            .await
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Conflict { .. }));
        assert!(second.runs().status().await.unwrap().is_running());

        gate.notify_one();
        assert!(handle.await.unwrap().unwrap().succeeded());

        // The last run outlives the console that started it.
        let later = Console::new(ConsoleConfig::new(temp_dir.path()));
        match later.runs().status().await.unwrap() {
            JobStatus::Completed(outcome) => assert_eq!(outcome.config, "/config/run_local.yaml"),
            other => panic!("unexpected status {other:?}"),
        }
        assert!(second.runs().spawn("/config/run_local.yaml").await.is_ok());
    }
}
