//! Compiled check specifications and notification routing.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::names::IDENTITY_DELIMITER;

/// Check type emitted by the configuration compiler.
pub const POD_HEALTH_CHECK_TYPE: &str = "ocp_pod_health";

/// Timeout handed to the execution engine for every pod health check.
pub const DEFAULT_TIMEOUT_SECS: u32 = 30;

/// Notification delivery channel known to the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Zabbix,
    Smtp,
    DevSmtp,
    DevOutbox,
}

impl Channel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zabbix => "zabbix",
            Self::Smtp => "smtp",
            Self::DevSmtp => "dev_smtp",
            Self::DevOutbox => "dev_outbox",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered primary and fallback channels for an alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRoute {
    pub primary: Vec<Channel>,
    pub fallback: Vec<Channel>,
}

impl NotificationRoute {
    /// Route for a namespace's `(zabbix_enabled, mail_enabled)` toggles.
    pub fn for_toggles(zabbix_enabled: bool, mail_enabled: bool) -> Self {
        use Channel::{DevOutbox, DevSmtp, Smtp, Zabbix};

        let (primary, fallback) = match (zabbix_enabled, mail_enabled) {
            (true, true) => (vec![Zabbix], vec![DevSmtp, Smtp, DevOutbox]),
            (true, false) => (vec![Zabbix], vec![DevSmtp, DevOutbox]),
            (false, true) => (vec![Smtp], vec![DevSmtp, DevOutbox]),
            (false, false) => (vec![DevOutbox], vec![]),
        };
        Self { primary, fallback }
    }
}

/// Structured identity of a check: `<check_type>__<namespace>__<cluster>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckIdentity {
    pub check_type: String,
    pub namespace: String,
    pub cluster: String,
}

impl CheckIdentity {
    pub fn new(
        check_type: impl Into<String>,
        namespace: impl Into<String>,
        cluster: impl Into<String>,
    ) -> Self {
        Self {
            check_type: check_type.into(),
            namespace: namespace.into(),
            cluster: cluster.into(),
        }
    }

    /// Decode an identity written by a producer that only kept the joined name.
    ///
    /// Exactly three non-empty segments are required; anything else is not an
    /// identity this console produced.
    pub fn parse(name: &str) -> Option<Self> {
        let mut parts = name.split(IDENTITY_DELIMITER);
        let check_type = parts.next()?;
        let namespace = parts.next()?;
        let cluster = parts.next()?;
        if parts.next().is_some()
            || check_type.is_empty()
            || namespace.is_empty()
            || cluster.is_empty()
        {
            return None;
        }
        Some(Self::new(check_type, namespace, cluster))
    }
}

impl fmt::Display for CheckIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}",
            self.check_type,
            self.namespace,
            self.cluster,
            d = IDENTITY_DELIMITER
        )
    }
}

/// Parameters handed to the execution engine for one pod health check.
///
/// Values stay strings because that is what the engine's YAML loader expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckParams {
    pub namespace: String,
    pub cluster: String,
    pub ocp_api: String,
    pub ocp_token_file: String,
    pub ocp_insecure: String,
    pub timeout_sec: String,
    pub node: String,
    pub department: String,
    pub severity: String,
    #[serde(rename = "alertgroup")]
    pub alert_group: String,
    #[serde(rename = "alertkey")]
    pub alert_key: String,
}

/// One compiled, executable unit of monitoring work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub check_type: String,
    pub enabled: bool,
    pub params: CheckParams,
    pub notify: NotificationRoute,
}

/// Document written per generator: `{ checks: [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDocument {
    #[serde(default)]
    pub checks: Vec<CheckSpec>,
}
