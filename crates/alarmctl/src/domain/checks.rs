//! Check catalog across hand-written (`checks/`) and generated documents.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tokio::fs;
use tracing::{info, warn};

use crate::entities::{ItemFailure, Listing};
use crate::errors::{ConsoleError, ConsoleResult};
use crate::storage::{list_files, read_text, write_atomic};

const KIND: &str = "Check";
const CHECKS_KEY: &str = "checks";
const HAND_WRITTEN_DIR: &str = "checks";
const GENERATED_DIR: &str = "generated";

/// A check and where it is declared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub check_type: String,
    /// Path relative to the configuration directory, e.g. `generated/ocp_pod_health.yaml`.
    pub source_file: String,
    /// Whether the compiler owns the declaring document.
    pub generated: bool,
    pub definition: Mapping,
}

fn str_field(check: &Mapping, key: &str) -> String {
    check
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn checks_of(document: &Value) -> Vec<Mapping> {
    document
        .get(CHECKS_KEY)
        .and_then(Value::as_sequence)
        .map(|items| items.iter().filter_map(Value::as_mapping).cloned().collect())
        .unwrap_or_default()
}

async fn load_document(path: &Path) -> ConsoleResult<Value> {
    let text = read_text(path).await?.unwrap_or_default();
    if text.trim().is_empty() {
        return Ok(Value::Mapping(Mapping::new()));
    }
    serde_yaml::from_str(&text).map_err(|e| ConsoleError::Malformed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Read-mostly view of every check the execution engine would load.
#[derive(Debug, Clone)]
pub struct ChecksDomain {
    config_dir: PathBuf,
}

impl ChecksDomain {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.config_dir)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    /// Hand-written checks first, then generated ones; files in name order.
    pub async fn list(&self) -> ConsoleResult<Listing<CatalogEntry>> {
        let mut listing = Listing::default();
        for subdir in [HAND_WRITTEN_DIR, GENERATED_DIR] {
            for path in list_files(&self.config_dir.join(subdir), "yaml").await? {
                match load_document(&path).await {
                    Ok(document) => {
                        let source_file = self.relative(&path);
                        listing.items.extend(checks_of(&document).into_iter().map(|check| {
                            CatalogEntry {
                                name: str_field(&check, "name"),
                                check_type: str_field(&check, "type"),
                                source_file: source_file.clone(),
                                generated: subdir == GENERATED_DIR,
                                definition: check,
                            }
                        }));
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable check document");
                        listing
                            .failures
                            .push(ItemFailure::new(self.relative(&path), e.to_string()));
                    }
                }
            }
        }
        Ok(listing)
    }

    pub async fn get(&self, name: &str) -> ConsoleResult<CatalogEntry> {
        self.list()
            .await?
            .items
            .into_iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| ConsoleError::not_found(KIND, name))
    }

    /// Write a new hand-written check to `checks/<name>.yaml`.
    pub async fn create(&self, definition: Mapping) -> ConsoleResult<CatalogEntry> {
        let name = str_field(&definition, "name");
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ConsoleError::InvalidName {
                kind: KIND,
                name,
                reason: "a check needs a name of ASCII letters, digits, '-' and '_'".to_string(),
            });
        }

        let path = self.config_dir.join(HAND_WRITTEN_DIR).join(format!("{name}.yaml"));
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ConsoleError::Conflict {
                reason: format!("{} already exists", self.relative(&path)),
            });
        }

        let mut document = Mapping::new();
        document.insert(
            CHECKS_KEY.into(),
            Value::Sequence(vec![Value::Mapping(definition.clone())]),
        );
        write_atomic(&path, &serde_yaml::to_string(&document)?).await?;
        info!(check = %name, "Check created");

        Ok(CatalogEntry {
            check_type: str_field(&definition, "type"),
            source_file: self.relative(&path),
            generated: false,
            definition,
            name,
        })
    }

    fn reject_generated(entry: &CatalogEntry) -> ConsoleResult<()> {
        if entry.generated {
            return Err(ConsoleError::InvalidArgument {
                reason: format!(
                    "check '{}' is generated; edit its namespace or cluster instead",
                    entry.name
                ),
            });
        }
        Ok(())
    }

    /// Replace a hand-written check in place inside its declaring file.
    ///
    /// A definition without a name keeps `name`; renaming is rejected.
    pub async fn update(&self, name: &str, mut definition: Mapping) -> ConsoleResult<CatalogEntry> {
        let entry = self.get(name).await?;
        Self::reject_generated(&entry)?;
        match definition.get("name").map(Value::as_str) {
            None => {
                definition.insert("name".into(), name.into());
            }
            Some(Some(given)) if given == name => {}
            Some(_) => {
                return Err(ConsoleError::InvalidArgument {
                    reason: format!("check '{name}' cannot be renamed by an update"),
                })
            }
        }

        let path = self.config_dir.join(&entry.source_file);
        let mut document = load_document(&path).await?;
        let slot = match document.get_mut(CHECKS_KEY) {
            Some(Value::Sequence(items)) => items
                .iter_mut()
                .find(|item| item.get("name").and_then(Value::as_str) == Some(name)),
            _ => None,
        };
        let Some(slot) = slot else {
            return Err(ConsoleError::not_found(KIND, name));
        };
        *slot = Value::Mapping(definition.clone());
        write_atomic(&path, &serde_yaml::to_string(&document)?).await?;
        info!(check = name, file = %entry.source_file, "Check updated");

        Ok(CatalogEntry {
            check_type: str_field(&definition, "type"),
            definition,
            ..entry
        })
    }

    /// Remove a hand-written check; the declaring file goes when it empties.
    ///
    /// Generated checks are rejected: the next compile would recreate them.
    pub async fn delete(&self, name: &str) -> ConsoleResult<()> {
        let entry = self.get(name).await?;
        Self::reject_generated(&entry)?;

        let path = self.config_dir.join(&entry.source_file);
        let mut document = load_document(&path).await?;
        let remaining = match document.get_mut(CHECKS_KEY) {
            Some(Value::Sequence(items)) => {
                items.retain(|item| {
                    item.get("name").and_then(Value::as_str) != Some(name)
                });
                items.len()
            }
            _ => 0,
        };

        if remaining == 0 {
            fs::remove_file(&path).await?;
        } else {
            write_atomic(&path, &serde_yaml::to_string(&document)?).await?;
        }
        info!(check = name, file = %entry.source_file, "Check deleted");
        Ok(())
    }
}
