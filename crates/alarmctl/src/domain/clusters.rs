//! Clusters domain facade.

use tracing::{debug, info};

use super::compiler::ConfigCompiler;
use crate::entities::{ClusterDefinition, ClusterView, Listing};
use crate::errors::ConsoleResult;
use crate::storage::{indirection_key, ClusterRegistry, EnvSnapshot, EnvironmentStore, SecretStore};

/// Cluster operations; every mutation recompiles the generated checks.
#[derive(Debug, Clone)]
pub struct ClustersDomain {
    registry: ClusterRegistry,
    env: EnvironmentStore,
    secrets: SecretStore,
    compiler: ConfigCompiler,
}

impl ClustersDomain {
    pub fn new(
        registry: ClusterRegistry,
        env: EnvironmentStore,
        secrets: SecretStore,
        compiler: ConfigCompiler,
    ) -> Self {
        Self {
            registry,
            env,
            secrets,
            compiler,
        }
    }

    async fn view(&self, cluster: ClusterDefinition, env: &EnvSnapshot) -> ClusterView {
        ClusterView {
            api_endpoint: env.resolve(&cluster.api_endpoint),
            insecure_tls: cluster.insecure_tls,
            has_token: self.secrets.exists(&cluster.name).await,
            name: cluster.name,
        }
    }

    /// Stored definitions, endpoints unresolved
    pub async fn listing(&self) -> ConsoleResult<Listing<ClusterDefinition>> {
        self.registry.listing().await
    }

    /// Every cluster with its endpoint resolved and credential presence known
    pub async fn list(&self) -> ConsoleResult<Vec<ClusterView>> {
        let env = self.env.snapshot().await?;
        let mut views = Vec::new();
        for cluster in self.registry.list().await? {
            views.push(self.view(cluster, &env).await);
        }
        Ok(views)
    }

    pub async fn get(&self, name: &str) -> ConsoleResult<ClusterView> {
        let cluster = self.registry.get(name).await?;
        let env = self.env.snapshot().await?;
        Ok(self.view(cluster, &env).await)
    }

    /// The stored definition, endpoint exactly as written
    pub async fn definition(&self, name: &str) -> ConsoleResult<ClusterDefinition> {
        self.registry.get(name).await
    }

    /// Create or replace a cluster and return the post-compile check count.
    ///
    /// A literal endpoint is also written to the environment under the
    /// cluster's canonical key so `${OCP_API_<NAME>}` indirections resolve.
    pub async fn upsert(
        &self,
        name: &str,
        mut definition: ClusterDefinition,
    ) -> ConsoleResult<usize> {
        definition.name = name.to_string();
        definition.api_endpoint = definition.api_endpoint.trim().to_string();
        // Nothing is written unless both the definition and the endpoint are storable.
        ClusterRegistry::validate(&definition)?;

        let endpoint = &definition.api_endpoint;
        if !endpoint.is_empty() && indirection_key(endpoint).is_none() {
            self.env.set(&definition.env_key(), endpoint).await?;
        } else {
            debug!(cluster = name, "Endpoint is indirect or empty; environment untouched");
        }
        self.registry.upsert(&definition).await?;

        let count = self.compiler.compile().await?;
        info!(cluster = name, checks = count, "Cluster saved");
        Ok(count)
    }

    /// Delete a cluster and return the post-compile check count.
    pub async fn delete(&self, name: &str) -> ConsoleResult<usize> {
        self.registry.delete(name).await?;
        let count = self.compiler.compile().await?;
        info!(cluster = name, checks = count, "Cluster deleted");
        Ok(count)
    }
}
