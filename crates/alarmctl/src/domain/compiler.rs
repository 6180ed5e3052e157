//! Configuration compiler: namespace and cluster definitions in, executable
//! check specifications out.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::entities::{
    CheckIdentity, CheckParams, CheckSpec, ClusterDefinition, GeneratedDocument, ItemFailure,
    NamespaceDefinition, NotificationRoute, DEFAULT_ALERT_KEY, DEFAULT_SEVERITY, DEFAULT_TIMEOUT_SECS,
    POD_HEALTH_CHECK_TYPE,
};
use crate::errors::ConsoleResult;
use crate::storage::{
    ClusterRegistry, EnvSnapshot, EnvironmentStore, GeneratedStore, NamespaceRegistry,
};

const DEFAULT_NODE: &str = "OCP";
const DEFAULT_DEPARTMENT: &str = "UNKNOWN";
const ALERT_GROUP_SUFFIX: &str = "AlertGroup";

/// Why a listed `(namespace, cluster)` pair produced no check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The namespace lists a cluster that has no definition.
    UndefinedCluster,
    /// The endpoint is an indirection to an environment key that is not set.
    UnresolvedEndpoint { token: String },
    /// The endpoint resolved to nothing.
    EmptyEndpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped {
    pub namespace: String,
    pub cluster: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Outcome of one compile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompileReport {
    /// Number of checks written.
    pub checks: usize,
    pub skipped: Vec<Skipped>,
    /// Definition files that could not be read and were left out.
    pub failures: Vec<ItemFailure>,
}

fn or_default(value: &str, default: impl FnOnce() -> String) -> String {
    if value.trim().is_empty() {
        default()
    } else {
        value.to_string()
    }
}

/// Build the full check set.
///
/// Namespaces are compiled in the order given, clusters in each namespace's
/// list order. Dangling cluster references and endpoints that do not resolve
/// are skipped and reported, never treated as errors.
pub fn compile_checks(
    namespaces: &[NamespaceDefinition],
    clusters: &[ClusterDefinition],
    env: &EnvSnapshot,
) -> (Vec<CheckSpec>, Vec<Skipped>) {
    let by_name: HashMap<&str, &ClusterDefinition> =
        clusters.iter().map(|c| (c.name.as_str(), c)).collect();

    let mut checks = Vec::new();
    let mut skipped = Vec::new();

    for ns in namespaces {
        if !ns.is_compilable() {
            debug!(namespace = %ns.name, enabled = ns.enabled, "Namespace not compiled");
            continue;
        }
        let route = NotificationRoute::for_toggles(ns.zabbix_enabled, ns.mail_enabled);

        for cluster_name in &ns.clusters {
            let skip = |reason: SkipReason| Skipped {
                namespace: ns.name.clone(),
                cluster: cluster_name.clone(),
                reason,
            };

            let Some(cluster) = by_name.get(cluster_name.as_str()) else {
                debug!(namespace = %ns.name, cluster = %cluster_name, "Skipping undefined cluster");
                skipped.push(skip(SkipReason::UndefinedCluster));
                continue;
            };
            let endpoint = match env.try_resolve(&cluster.api_endpoint) {
                None => {
                    debug!(cluster = %cluster.name, token = %cluster.api_endpoint, "Endpoint does not resolve");
                    skipped.push(skip(SkipReason::UnresolvedEndpoint {
                        token: cluster.api_endpoint.clone(),
                    }));
                    continue;
                }
                Some(endpoint) if endpoint.trim().is_empty() => {
                    skipped.push(skip(SkipReason::EmptyEndpoint));
                    continue;
                }
                Some(endpoint) => endpoint.trim().to_string(),
            };

            let identity = CheckIdentity::new(POD_HEALTH_CHECK_TYPE, &ns.name, &cluster.name);
            checks.push(CheckSpec {
                name: identity.to_string(),
                check_type: identity.check_type,
                enabled: true,
                params: CheckParams {
                    namespace: ns.name.clone(),
                    cluster: cluster.name.clone(),
                    ocp_api: endpoint,
                    ocp_token_file: cluster.token_locator(),
                    ocp_insecure: cluster.insecure_tls.to_string(),
                    timeout_sec: DEFAULT_TIMEOUT_SECS.to_string(),
                    node: or_default(&ns.node, || DEFAULT_NODE.to_string()),
                    department: or_default(&ns.department, || DEFAULT_DEPARTMENT.to_string()),
                    severity: or_default(&ns.severity, || DEFAULT_SEVERITY.to_string()),
                    alert_group: or_default(&ns.alert_group, || {
                        format!("{}{ALERT_GROUP_SUFFIX}", ns.name)
                    }),
                    alert_key: or_default(&ns.alert_key, || DEFAULT_ALERT_KEY.to_string()),
                },
                notify: route.clone(),
            });
        }
    }

    (checks, skipped)
}

/// Recomputes and persists the generated check set from the registries.
#[derive(Debug, Clone)]
pub struct ConfigCompiler {
    namespaces: NamespaceRegistry,
    clusters: ClusterRegistry,
    env: EnvironmentStore,
    generated: GeneratedStore,
}

impl ConfigCompiler {
    pub fn new(
        namespaces: NamespaceRegistry,
        clusters: ClusterRegistry,
        env: EnvironmentStore,
        generated: GeneratedStore,
    ) -> Self {
        Self {
            namespaces,
            clusters,
            env,
            generated,
        }
    }

    /// Recompile everything and replace the generated document.
    ///
    /// Unreadable definitions are left out and reported; only a failure to
    /// enumerate a registry or to write the result is an error.
    pub async fn compile_report(&self) -> ConsoleResult<CompileReport> {
        let namespaces = self.namespaces.listing().await?;
        let clusters = self.clusters.listing().await?;
        let env = self.env.snapshot().await?;

        let (checks, skipped) = compile_checks(&namespaces.items, &clusters.items, &env);
        let count = checks.len();
        self.generated.write(&GeneratedDocument { checks }).await?;

        let mut failures = namespaces.failures;
        failures.extend(clusters.failures);
        info!(
            checks = count,
            skipped = skipped.len(),
            failures = failures.len(),
            "Configuration compiled"
        );
        Ok(CompileReport {
            checks: count,
            skipped,
            failures,
        })
    }

    /// Recompile and return the number of checks written.
    pub async fn compile(&self) -> ConsoleResult<usize> {
        Ok(self.compile_report().await?.checks)
    }
}
