//! Namespace definitions.

use serde::{Deserialize, Serialize};

/// Default severity written for a namespace that does not set one.
pub(crate) const DEFAULT_SEVERITY: &str = "5";

/// Default alert key for pod health alarms.
pub(crate) const DEFAULT_ALERT_KEY: &str = "OCP_POD_HEALTH";

/// Operator-edited definition of one workload namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDefinition {
    /// Unique name, derived from the storage key.
    pub name: String,

    /// Whether checks are compiled for this namespace at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Target clusters in operator order; may name clusters that are not defined yet.
    #[serde(default)]
    pub clusters: Vec<String>,

    #[serde(default)]
    pub zabbix_enabled: bool,

    #[serde(default)]
    pub mail_enabled: bool,

    #[serde(default = "default_severity")]
    pub severity: String,

    #[serde(default)]
    pub node: String,

    #[serde(default)]
    pub department: String,

    #[serde(default = "default_alert_key")]
    pub alert_key: String,

    #[serde(default)]
    pub alert_group: String,

    #[serde(default)]
    pub mail_to: String,

    #[serde(default)]
    pub mail_cc: String,
}

fn default_true() -> bool {
    true
}

fn default_severity() -> String {
    DEFAULT_SEVERITY.to_string()
}

fn default_alert_key() -> String {
    DEFAULT_ALERT_KEY.to_string()
}

impl NamespaceDefinition {
    /// Create an enabled namespace with no targets and default metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            clusters: Vec::new(),
            zabbix_enabled: false,
            mail_enabled: false,
            severity: default_severity(),
            node: String::new(),
            department: String::new(),
            alert_key: default_alert_key(),
            alert_group: String::new(),
            mail_to: String::new(),
            mail_cc: String::new(),
        }
    }

    /// Replace the cluster list, normalizing it.
    pub fn with_clusters<I, S>(mut self, clusters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.clusters = normalize_clusters(clusters);
        self
    }

    /// Set the notification toggles.
    pub fn with_notifications(mut self, zabbix_enabled: bool, mail_enabled: bool) -> Self {
        self.zabbix_enabled = zabbix_enabled;
        self.mail_enabled = mail_enabled;
        self
    }

    /// Set the enablement flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether this namespace produces any checks when compiled.
    pub fn is_compilable(&self) -> bool {
        self.enabled && !self.clusters.is_empty()
    }
}

/// Normalize a cluster list: split on commas, trim, drop blanks, de-duplicate
/// keeping the first occurrence.
pub fn normalize_clusters<I, S>(clusters: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for entry in clusters {
        for part in entry.as_ref().split(',') {
            let part = part.trim();
            if !part.is_empty() && !out.iter().any(|c| c == part) {
                out.push(part.to_string());
            }
        }
    }
    out
}
