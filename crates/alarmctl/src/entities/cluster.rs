//! Cluster definitions.

use serde::{Deserialize, Serialize};

/// Operator-edited definition of one target cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDefinition {
    pub name: String,

    /// Literal API URL or an indirection token such as `${OCP_API_EAST}`.
    #[serde(default)]
    pub api_endpoint: String,

    #[serde(default = "default_insecure")]
    pub insecure_tls: bool,
}

fn default_insecure() -> bool {
    true
}

impl ClusterDefinition {
    pub fn new(name: impl Into<String>, api_endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_endpoint: api_endpoint.into(),
            insecure_tls: true,
        }
    }

    pub fn with_insecure_tls(mut self, insecure_tls: bool) -> Self {
        self.insecure_tls = insecure_tls;
        self
    }

    /// Environment key that holds this cluster's literal endpoint
    /// (`esy2-digital` -> `OCP_API_ESY2_DIGITAL`).
    pub fn env_key(&self) -> String {
        cluster_env_key(&self.name)
    }

    /// Conventional credential locator the execution engine reads.
    pub fn token_locator(&self) -> String {
        format!("/secrets/{}.token", self.name)
    }
}

pub(crate) fn cluster_env_key(name: &str) -> String {
    format!("OCP_API_{}", name.to_uppercase().replace('-', "_"))
}

/// Cluster as presented to operators: endpoint resolved, token presence known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterView {
    pub name: String,
    pub api_endpoint: String,
    pub insecure_tls: bool,
    pub has_token: bool,
}
