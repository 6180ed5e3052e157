//! Generated check documents (`<config>/generated/*.yaml`).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

use super::fs_util::{list_files, read_text, write_atomic};
use crate::entities::{GeneratedDocument, ItemFailure, Listing, ScopeKey};
use crate::errors::{ConsoleError, ConsoleResult};

const YAML_EXTENSION: &str = "yaml";

/// A check as seen by the topology scan.
///
/// Parsed loosely because other generators share the directory and use their
/// own parameter shapes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopologyCheck {
    #[serde(rename = "type", default)]
    pub check_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub params: Option<Mapping>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct LooseDocument {
    #[serde(default)]
    checks: Option<Vec<TopologyCheck>>,
}

impl TopologyCheck {
    /// `(namespace, cluster)` pairs this check covers.
    ///
    /// `params.namespace` may be a single name or a list; a `params.namespaces`
    /// list is also honoured. Blank names are ignored.
    pub fn pairs(&self) -> Vec<ScopeKey> {
        let Some(params) = &self.params else {
            return Vec::new();
        };
        let Some(cluster) = params.get("cluster").and_then(Value::as_str) else {
            return Vec::new();
        };
        if cluster.is_empty() {
            return Vec::new();
        }

        let mut namespaces = Vec::new();
        for key in ["namespace", "namespaces"] {
            match params.get(key) {
                Some(Value::String(ns)) => namespaces.push(ns.as_str()),
                Some(Value::Sequence(items)) => {
                    namespaces.extend(items.iter().filter_map(Value::as_str));
                }
                _ => {}
            }
        }

        namespaces
            .into_iter()
            .filter(|ns| !ns.is_empty())
            .map(|ns| ScopeKey::new(ns, cluster))
            .collect()
    }
}

/// Store for the documents the compiler produces.
#[derive(Debug, Clone)]
pub struct GeneratedStore {
    dir: PathBuf,
    file_name: String,
}

impl GeneratedStore {
    /// `file_name` is the document this console's compiler owns; the other
    /// documents in `dir` are only read.
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Replace the owned document as a whole.
    pub async fn write(&self, document: &GeneratedDocument) -> ConsoleResult<()> {
        let yaml = serde_yaml::to_string(document)?;
        let path = self.path();
        write_atomic(&path, &yaml).await?;
        info!(path = %path.display(), checks = document.checks.len(), "Generated checks written");
        Ok(())
    }

    /// The owned document, or `None` before the first compile.
    pub async fn read(&self) -> ConsoleResult<Option<GeneratedDocument>> {
        let path = self.path();
        let Some(text) = read_text(&path).await? else {
            return Ok(None);
        };
        if text.trim().is_empty() {
            return Ok(Some(GeneratedDocument::default()));
        }
        serde_yaml::from_str(&text)
            .map(Some)
            .map_err(|e| ConsoleError::Malformed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    /// Every check in every generated document, loosely parsed.
    pub async fn topology_checks(&self) -> ConsoleResult<Listing<TopologyCheck>> {
        let mut listing = Listing::default();
        for path in list_files(&self.dir, YAML_EXTENSION).await? {
            match load_loose(&path).await {
                Ok(checks) => {
                    debug!(path = %path.display(), count = checks.len(), "Scanned generated document");
                    listing.items.extend(checks);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable generated document");
                    listing
                        .failures
                        .push(ItemFailure::new(path.display().to_string(), e.to_string()));
                }
            }
        }
        Ok(listing)
    }
}

async fn load_loose(path: &Path) -> ConsoleResult<Vec<TopologyCheck>> {
    let Some(text) = read_text(path).await? else {
        return Ok(Vec::new());
    };
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let document: LooseDocument =
        serde_yaml::from_str(&text).map_err(|e| ConsoleError::Malformed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    Ok(document.checks.unwrap_or_default())
}
