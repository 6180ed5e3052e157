//! Namespaces domain facade.

use tracing::info;

use super::compiler::ConfigCompiler;
use crate::entities::{normalize_clusters, Listing, NamespaceDefinition};
use crate::errors::ConsoleResult;
use crate::storage::NamespaceRegistry;

/// Namespace operations; every mutation recompiles the generated checks.
#[derive(Debug, Clone)]
pub struct NamespacesDomain {
    registry: NamespaceRegistry,
    compiler: ConfigCompiler,
}

impl NamespacesDomain {
    pub fn new(registry: NamespaceRegistry, compiler: ConfigCompiler) -> Self {
        Self { registry, compiler }
    }

    /// All readable namespaces, sorted by name
    pub async fn list(&self) -> ConsoleResult<Vec<NamespaceDefinition>> {
        self.registry.list().await
    }

    /// All namespaces plus the definition files that failed to parse
    pub async fn listing(&self) -> ConsoleResult<Listing<NamespaceDefinition>> {
        self.registry.listing().await
    }

    pub async fn get(&self, name: &str) -> ConsoleResult<NamespaceDefinition> {
        self.registry.get(name).await
    }

    /// Create or replace a namespace and return the post-compile check count.
    ///
    /// The stored name is always `name`, whatever the definition carries.
    pub async fn upsert(
        &self,
        name: &str,
        mut definition: NamespaceDefinition,
    ) -> ConsoleResult<usize> {
        definition.name = name.to_string();
        definition.clusters = normalize_clusters(&definition.clusters);
        self.registry.upsert(&definition).await?;
        let count = self.compiler.compile().await?;
        info!(namespace = name, checks = count, "Namespace saved");
        Ok(count)
    }

    /// Delete a namespace and return the post-compile check count.
    pub async fn delete(&self, name: &str) -> ConsoleResult<usize> {
        self.registry.delete(name).await?;
        let count = self.compiler.compile().await?;
        info!(namespace = name, checks = count, "Namespace deleted");
        Ok(count)
    }
}
