//! Dedup policy document (`<config>/policies/dedup.yaml`).

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::errors::{ConsoleError, ConsoleResult};
use crate::storage::{read_text, write_atomic};

const KIND: &str = "Policy";
const POLICY_KEY: &str = "dedup_policy";

fn merge(target: &mut Mapping, fields: Mapping) {
    for (key, value) in fields {
        target.insert(key, value);
    }
}

#[derive(Debug, Clone)]
pub struct PoliciesDomain {
    path: PathBuf,
}

impl PoliciesDomain {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> ConsoleResult<Mapping> {
        let text = read_text(&self.path)
            .await?
            .ok_or_else(|| ConsoleError::not_found(KIND, "dedup.yaml"))?;
        if text.trim().is_empty() {
            return Ok(Mapping::new());
        }
        serde_yaml::from_str(&text).map_err(|e| ConsoleError::Malformed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// The policy section when the document nests one, otherwise the whole
    /// document.
    pub async fn get(&self) -> ConsoleResult<Mapping> {
        let mut document = self.load().await?;
        match document.remove(POLICY_KEY) {
            Some(Value::Mapping(policy)) if !policy.is_empty() => Ok(policy),
            Some(other) => {
                document.insert(POLICY_KEY.into(), other);
                Ok(document)
            }
            None => Ok(document),
        }
    }

    /// Shallow-merge `fields` into the same section [`get`](Self::get) reads
    /// and return the merged policy.
    pub async fn update(&self, fields: Mapping) -> ConsoleResult<Mapping> {
        let mut document = self.load().await?;
        if let Some(Value::Mapping(policy)) = document.get_mut(POLICY_KEY) {
            merge(policy, fields);
        } else {
            merge(&mut document, fields);
        }

        write_atomic(&self.path, &serde_yaml::to_string(&document)?).await?;
        info!(path = %self.path.display(), "Dedup policy updated");
        self.get().await
    }
}
