//! The console facade: every operation of one AlarmFW installation.

use std::sync::Arc;

use tracing::debug;

use super::checks::ChecksDomain;
use super::clusters::ClustersDomain;
use super::compiler::{CompileReport, ConfigCompiler};
use super::monitor::TopologyReconciler;
use super::namespaces::NamespacesDomain;
use super::notifiers::NotifiersDomain;
use super::policies::PoliciesDomain;
use super::runs::{ComposeExecutor, RunExecutor, RunRegister, RunService, STALE_GRACE};
use crate::config::{ConsoleConfig, StateBackend, GENERATED_FILE_NAME};
use crate::entities::{
    ClusterDefinition, MonitorReport, MonitorSnapshot, NamespaceDefinition, RunOutcome,
};
use crate::errors::ConsoleResult;
use crate::storage::{
    ClusterRegistry, EnvironmentStore, GeneratedStore, NamespaceRegistry, OutboxStateStore,
    SecretStore, SqliteStateStore, StateStore,
};

/// Wires the stores of one installation into its domain facades.
///
/// Nothing is cached: every call reads the backing files again.
#[derive(Clone)]
pub struct Console {
    config: ConsoleConfig,
    env: EnvironmentStore,
    secrets: SecretStore,
    compiler: ConfigCompiler,
    namespaces: NamespacesDomain,
    clusters: ClustersDomain,
    monitor: TopologyReconciler,
    notifiers: NotifiersDomain,
    policies: PoliciesDomain,
    checks: ChecksDomain,
    state: Arc<dyn StateStore>,
    outbox: OutboxStateStore,
    runs: RunService,
}

impl Console {
    /// Console whose runs go through `docker compose` from the installation root.
    pub fn new(config: ConsoleConfig) -> Self {
        let executor = ComposeExecutor::new(config.compose_file())
            .in_dir(&config.root)
            .with_timeout(config.run_timeout);
        Self::with_executor(config, Arc::new(executor))
    }

    pub fn with_executor(config: ConsoleConfig, executor: Arc<dyn RunExecutor>) -> Self {
        let env = EnvironmentStore::new(&config.env_file);
        let secrets = SecretStore::new(&config.secrets_dir);
        let namespace_registry = NamespaceRegistry::new(config.namespaces_dir());
        let cluster_registry = ClusterRegistry::new(config.clusters_dir());
        let generated = GeneratedStore::new(config.generated_dir(), GENERATED_FILE_NAME);
        let outbox = OutboxStateStore::new(config.outbox_dir());

        let state: Arc<dyn StateStore> = match config.state_backend {
            StateBackend::Outbox => Arc::new(outbox.clone()),
            StateBackend::Sqlite => Arc::new(SqliteStateStore::new(config.state_db())),
        };
        debug!(backend = %config.state_backend, root = %config.root.display(), "Console ready");

        let compiler = ConfigCompiler::new(
            namespace_registry.clone(),
            cluster_registry.clone(),
            env.clone(),
            generated.clone(),
        );

        Self {
            namespaces: NamespacesDomain::new(namespace_registry, compiler.clone()),
            clusters: ClustersDomain::new(
                cluster_registry,
                env.clone(),
                secrets.clone(),
                compiler.clone(),
            ),
            monitor: TopologyReconciler::new(generated, state.clone()),
            notifiers: NotifiersDomain::new(config.notifiers_dir()),
            policies: PoliciesDomain::new(config.dedup_policy_file()),
            checks: ChecksDomain::new(&config.config_dir),
            runs: RunService::new(
                RunRegister::new(&config.state_dir)
                    .with_stale_after(config.run_timeout + STALE_GRACE),
                executor,
            ),
            env,
            secrets,
            compiler,
            state,
            outbox,
            config,
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub async fn compile(&self) -> ConsoleResult<usize> {
        self.compiler.compile().await
    }

    pub async fn compile_report(&self) -> ConsoleResult<CompileReport> {
        self.compiler.compile_report().await
    }

    pub async fn upsert_namespace(
        &self,
        name: &str,
        definition: NamespaceDefinition,
    ) -> ConsoleResult<usize> {
        self.namespaces.upsert(name, definition).await
    }

    pub async fn delete_namespace(&self, name: &str) -> ConsoleResult<usize> {
        self.namespaces.delete(name).await
    }

    pub async fn upsert_cluster(
        &self,
        name: &str,
        definition: ClusterDefinition,
    ) -> ConsoleResult<usize> {
        self.clusters.upsert(name, definition).await
    }

    pub async fn delete_cluster(&self, name: &str) -> ConsoleResult<usize> {
        self.clusters.delete(name).await
    }

    /// Active problems, newest record per `(namespace, cluster)`.
    pub async fn snapshots(
        &self,
        cluster: Option<&str>,
        namespace: Option<&str>,
    ) -> Vec<MonitorSnapshot> {
        self.monitor.snapshots(cluster, namespace).await
    }

    pub async fn report(&self, cluster: Option<&str>, namespace: Option<&str>) -> MonitorReport {
        self.monitor.report(cluster, namespace).await
    }

    /// Every namespace known from topology or state, sorted.
    pub async fn namespaces(&self) -> ConsoleResult<Vec<String>> {
        self.monitor.all_namespaces().await
    }

    /// Every cluster known from topology or state, sorted.
    pub async fn clusters(&self) -> ConsoleResult<Vec<String>> {
        self.monitor.all_clusters().await
    }

    /// Run the engine once with `run_config`, or the configured default.
    pub async fn run(&self, run_config: Option<&str>) -> ConsoleResult<RunOutcome> {
        self.runs
            .run(run_config.unwrap_or(&self.config.run_config))
            .await
    }

    pub fn namespace_domain(&self) -> &NamespacesDomain {
        &self.namespaces
    }

    pub fn cluster_domain(&self) -> &ClustersDomain {
        &self.clusters
    }

    pub fn monitor(&self) -> &TopologyReconciler {
        &self.monitor
    }

    pub fn env(&self) -> &EnvironmentStore {
        &self.env
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    pub fn notifiers(&self) -> &NotifiersDomain {
        &self.notifiers
    }

    pub fn policies(&self) -> &PoliciesDomain {
        &self.policies
    }

    pub fn checks(&self) -> &ChecksDomain {
        &self.checks
    }

    /// The configured alarm state backend.
    pub fn state(&self) -> &dyn StateStore {
        self.state.as_ref()
    }

    /// The outbox directory, whichever backend is configured for reads.
    pub fn outbox(&self) -> &OutboxStateStore {
        &self.outbox
    }

    pub fn runs(&self) -> &RunService {
        &self.runs
    }
}
