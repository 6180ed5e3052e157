//! Directory-of-definitions registries (`conf.d/`, `clusters.d/`).
//!
//! One `<name>.conf` file per definition; the file stem is the identity.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use super::conf::{bool_str, is_true, parse_conf, render_conf, validate_conf, ConfMap};
use super::fs_util::{list_files, read_text, stem, write_atomic};
use crate::entities::{
    normalize_clusters, validate_name, ClusterDefinition, ItemFailure, Listing,
    NamespaceDefinition, DEFAULT_ALERT_KEY, DEFAULT_SEVERITY,
};
use crate::errors::{ConsoleError, ConsoleResult};

const CONF_EXTENSION: &str = "conf";

/// A definition that round-trips through the `KEY="value"` format.
pub trait ConfRecord: Sized + Send + Sync {
    /// Human readable kind used in errors and logs.
    const KIND: &'static str;

    fn name(&self) -> &str;

    fn from_conf(name: &str, conf: &ConfMap) -> Self;

    fn to_conf(&self) -> ConfMap;
}

// Namespace keys
const CLUSTERS: &str = "CLUSTERS";
const NAMESPACE_ENABLED: &str = "NAMESPACE_ENABLED";
const POD_HEALTH_ENABLED: &str = "POD_HEALTH_ENABLED";
const ZABBIX_ENABLED: &str = "ZABBIX_ENABLED";
const MAIL_ENABLED: &str = "MAIL_ENABLED";
const SEVERITY: &str = "SEVERITY";
const NODE: &str = "NODE";
const DEPARTMENT: &str = "DEPARTMENT";
const ALERT_KEY: &str = "POD_HEALTH_ALERTKEY";
const ALERT_GROUP: &str = "ALERTGROUP";
const MAIL_TO: &str = "MAIL_TO";
const MAIL_CC: &str = "MAIL_CC";

// Cluster keys
const OCP_API: &str = "OCP_API";
const OCP_INSECURE: &str = "OCP_INSECURE";

fn value_or(conf: &ConfMap, key: &str, default: &str) -> String {
    conf.get(key).map_or_else(|| default.to_string(), Clone::clone)
}

impl ConfRecord for NamespaceDefinition {
    const KIND: &'static str = "Namespace";

    fn name(&self) -> &str {
        &self.name
    }

    fn from_conf(name: &str, conf: &ConfMap) -> Self {
        Self {
            name: name.to_string(),
            enabled: is_true(conf.get(NAMESPACE_ENABLED)),
            clusters: normalize_clusters(conf.get(CLUSTERS)),
            zabbix_enabled: is_true(conf.get(ZABBIX_ENABLED)),
            mail_enabled: is_true(conf.get(MAIL_ENABLED)),
            severity: value_or(conf, SEVERITY, DEFAULT_SEVERITY),
            node: value_or(conf, NODE, ""),
            department: value_or(conf, DEPARTMENT, ""),
            alert_key: value_or(conf, ALERT_KEY, DEFAULT_ALERT_KEY),
            alert_group: value_or(conf, ALERT_GROUP, ""),
            mail_to: value_or(conf, MAIL_TO, ""),
            mail_cc: value_or(conf, MAIL_CC, ""),
        }
    }

    fn to_conf(&self) -> ConfMap {
        let clusters = normalize_clusters(&self.clusters).join(",");
        let mut conf = ConfMap::new();
        conf.insert(CLUSTERS.to_string(), clusters);
        conf.insert(NAMESPACE_ENABLED.to_string(), bool_str(self.enabled));
        conf.insert(POD_HEALTH_ENABLED.to_string(), bool_str(true));
        conf.insert(ZABBIX_ENABLED.to_string(), bool_str(self.zabbix_enabled));
        conf.insert(MAIL_ENABLED.to_string(), bool_str(self.mail_enabled));
        conf.insert(SEVERITY.to_string(), self.severity.clone());
        conf.insert(NODE.to_string(), self.node.clone());
        conf.insert(DEPARTMENT.to_string(), self.department.clone());
        conf.insert(ALERT_KEY.to_string(), self.alert_key.clone());
        conf.insert(ALERT_GROUP.to_string(), self.alert_group.clone());
        conf.insert(MAIL_TO.to_string(), self.mail_to.clone());
        conf.insert(MAIL_CC.to_string(), self.mail_cc.clone());
        conf
    }
}

impl ConfRecord for ClusterDefinition {
    const KIND: &'static str = "Cluster";

    fn name(&self) -> &str {
        &self.name
    }

    fn from_conf(name: &str, conf: &ConfMap) -> Self {
        Self {
            name: name.to_string(),
            api_endpoint: value_or(conf, OCP_API, ""),
            insecure_tls: conf.get(OCP_INSECURE).is_none() || is_true(conf.get(OCP_INSECURE)),
        }
    }

    fn to_conf(&self) -> ConfMap {
        let mut conf = ConfMap::new();
        conf.insert(OCP_API.to_string(), self.api_endpoint.clone());
        conf.insert(OCP_INSECURE.to_string(), bool_str(self.insecure_tls));
        conf
    }
}

/// File-backed registry of one definition kind.
#[derive(Debug)]
pub struct ConfRegistry<T> {
    dir: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for ConfRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            dir: self.dir.clone(),
            _record: PhantomData,
        }
    }
}

/// Registry of namespace definitions.
pub type NamespaceRegistry = ConfRegistry<NamespaceDefinition>;

/// Registry of cluster definitions.
pub type ClusterRegistry = ConfRegistry<ClusterDefinition>;

impl<T: ConfRecord> ConfRegistry<T> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _record: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{CONF_EXTENSION}"))
    }

    async fn load(path: &Path) -> ConsoleResult<Option<T>> {
        let name = stem(path);
        Ok(read_text(path)
            .await?
            .map(|text| T::from_conf(&name, &parse_conf(&text))))
    }

    /// Every definition sorted by name, with unreadable files reported
    /// separately instead of aborting the listing.
    pub async fn listing(&self) -> ConsoleResult<Listing<T>> {
        let mut listing = Listing::default();
        for path in list_files(&self.dir, CONF_EXTENSION).await? {
            match Self::load(&path).await {
                Ok(Some(record)) => listing.items.push(record),
                // Removed between the directory scan and the read.
                Ok(None) => debug!(path = %path.display(), "Definition vanished during listing"),
                Err(e) => {
                    warn!(kind = T::KIND, path = %path.display(), error = %e, "Skipping unreadable definition");
                    listing
                        .failures
                        .push(ItemFailure::new(path.display().to_string(), e.to_string()));
                }
            }
        }
        Ok(listing)
    }

    /// Every readable definition sorted by name.
    pub async fn list(&self) -> ConsoleResult<Vec<T>> {
        Ok(self.listing().await?.into_items())
    }

    pub async fn get(&self, name: &str) -> ConsoleResult<T> {
        validate_name(T::KIND, name)?;
        Self::load(&self.path_for(name))
            .await?
            .ok_or_else(|| ConsoleError::not_found(T::KIND, name))
    }

    pub async fn exists(&self, name: &str) -> bool {
        validate_name(T::KIND, name).is_ok() && fs::try_exists(self.path_for(name)).await.unwrap_or(false)
    }

    /// Check that `record` can be stored without touching the disk.
    pub fn validate(record: &T) -> ConsoleResult<()> {
        validate_name(T::KIND, record.name())?;
        validate_conf(&record.to_conf())
    }

    /// Create or wholesale replace a definition.
    pub async fn upsert(&self, record: &T) -> ConsoleResult<()> {
        Self::validate(record)?;
        let path = self.path_for(record.name());
        write_atomic(&path, &render_conf(&record.to_conf())).await?;
        info!(kind = T::KIND, name = record.name(), "Definition saved");
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> ConsoleResult<()> {
        validate_name(T::KIND, name)?;
        match fs::remove_file(self.path_for(name)).await {
            Ok(()) => {
                info!(kind = T::KIND, name, "Definition deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConsoleError::not_found(T::KIND, name))
            }
            Err(e) => Err(ConsoleError::FileWrite {
                path: self.path_for(name).display().to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
