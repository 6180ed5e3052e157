//! Notifier credentials (`<config>/notifiers/*.yaml`).

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::{info, warn};

use crate::errors::{ConsoleError, ConsoleResult};
use crate::storage::{list_files, read_text, write_atomic, MASK};

const KIND: &str = "Notifier";
const NOTIFIERS_KEY: &str = "notifiers";
const SENSITIVE_FIELDS: [&str; 4] = ["password", "token", "pass", "secret"];

/// One notifier as shown to operators, sensitive fields masked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotifierView {
    pub name: String,
    /// File the notifier is declared in.
    pub source_file: String,
    pub fields: Mapping,
}

fn is_sensitive_field(key: &Value) -> bool {
    key.as_str().is_some_and(|k| {
        let lower = k.to_lowercase();
        SENSITIVE_FIELDS.iter().any(|s| lower.contains(s))
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn masked(fields: &Mapping) -> Mapping {
    fields
        .iter()
        .map(|(k, v)| {
            let shown = if is_sensitive_field(k) && !is_blank(v) {
                Value::String(MASK.to_string())
            } else {
                v.clone()
            };
            (k.clone(), shown)
        })
        .collect()
}

struct NotifierFile {
    path: PathBuf,
    document: Value,
}

impl NotifierFile {
    fn notifiers(&self) -> Option<&Mapping> {
        self.document.get(NOTIFIERS_KEY).and_then(Value::as_mapping)
    }

    fn source_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Notifier configuration editor.
#[derive(Debug, Clone)]
pub struct NotifiersDomain {
    dir: PathBuf,
}

impl NotifiersDomain {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn load(path: &Path) -> ConsoleResult<NotifierFile> {
        let text = read_text(path).await?.unwrap_or_default();
        let document = if text.trim().is_empty() {
            Value::Mapping(Mapping::new())
        } else {
            serde_yaml::from_str(&text).map_err(|e| ConsoleError::Malformed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
        };
        Ok(NotifierFile {
            path: path.to_path_buf(),
            document,
        })
    }

    async fn files(&self) -> ConsoleResult<Vec<NotifierFile>> {
        let mut files = Vec::new();
        for path in list_files(&self.dir, "yaml").await? {
            match Self::load(&path).await {
                Ok(file) => files.push(file),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable notifier file"),
            }
        }
        Ok(files)
    }

    /// Every declared notifier, files in name order. A name declared twice is
    /// reported from the first file.
    pub async fn list(&self) -> ConsoleResult<Vec<NotifierView>> {
        let mut views: Vec<NotifierView> = Vec::new();
        for file in self.files().await? {
            let Some(notifiers) = file.notifiers() else {
                continue;
            };
            for (name, fields) in notifiers {
                let Some(name) = name.as_str() else { continue };
                if views.iter().any(|v| v.name == name) {
                    continue;
                }
                views.push(NotifierView {
                    name: name.to_string(),
                    source_file: file.source_name(),
                    fields: fields.as_mapping().map(masked).unwrap_or_default(),
                });
            }
        }
        Ok(views)
    }

    pub async fn get(&self, name: &str) -> ConsoleResult<NotifierView> {
        self.list()
            .await?
            .into_iter()
            .find(|v| v.name == name)
            .ok_or_else(|| ConsoleError::not_found(KIND, name))
    }

    /// Merge `fields` into the notifier's entry and rewrite its file.
    ///
    /// Fields whose value is the mask placeholder are left untouched. Returns
    /// the names of the fields written.
    pub async fn update(&self, name: &str, fields: Mapping) -> ConsoleResult<Vec<String>> {
        for mut file in self.files().await? {
            let declared = file
                .notifiers()
                .is_some_and(|n| n.contains_key(name));
            if !declared {
                continue;
            }

            let mut written = Vec::new();
            let entry = file
                .document
                .get_mut(NOTIFIERS_KEY)
                .and_then(|n| n.get_mut(name))
                .ok_or_else(|| ConsoleError::not_found(KIND, name))?;
            if !entry.is_mapping() {
                *entry = Value::Mapping(Mapping::new());
            }
            if let Value::Mapping(existing) = entry {
                for (key, value) in fields {
                    if value.as_str() == Some(MASK) {
                        continue;
                    }
                    if let Some(k) = key.as_str() {
                        written.push(k.to_string());
                    }
                    existing.insert(key, value);
                }
            }

            let yaml = serde_yaml::to_string(&file.document)?;
            write_atomic(&file.path, &yaml).await?;
            info!(notifier = name, fields = ?written, "Notifier updated");
            return Ok(written);
        }
        Err(ConsoleError::not_found(KIND, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SMTP: &str = r"
notifiers:
  smtp:
    host: mail.example
    port: 587
    username: alarms
    password: hunter2
    smtp_pass: ''
  zabbix:
    url: https://zabbix.example/api_jsonrpc.php
    api_token: abc123
";

    fn domain(temp_dir: &TempDir) -> NotifiersDomain {
        let dir = temp_dir.path().join("notifiers");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("default.yaml"), SMTP).unwrap();
        NotifiersDomain::new(dir)
    }

    fn field<'a>(view: &'a NotifierView, key: &str) -> &'a Value {
        view.fields.get(key).unwrap()
    }

    #[tokio::test]
    async fn test_list_masks_sensitive_fields() {
        let temp_dir = TempDir::new().unwrap();
        let notifiers = domain(&temp_dir).list().await.unwrap();
        assert_eq!(notifiers.len(), 2);

        let smtp = &notifiers[0];
        assert_eq!(smtp.source_file, "default.yaml");
        assert_eq!(field(smtp, "password").as_str(), Some(MASK));
        assert_eq!(field(smtp, "smtp_pass").as_str(), Some(""));
        assert_eq!(field(smtp, "username").as_str(), Some("alarms"));
        assert_eq!(field(&notifiers[1], "api_token").as_str(), Some(MASK));
    }

    #[tokio::test]
    async fn test_update_keeps_masked_values() {
        let temp_dir = TempDir::new().unwrap();
        let domain = domain(&temp_dir);

        let mut fields = Mapping::new();
        fields.insert("password".into(), MASK.into());
        fields.insert("host".into(), "smtp.internal".into());
        let written = domain.update("smtp", fields).await.unwrap();
        assert_eq!(written, vec!["host"]);

        let text = std::fs::read_to_string(temp_dir.path().join("notifiers/default.yaml")).unwrap();
        assert!(text.contains("password: hunter2"));
        assert!(text.contains("host: smtp.internal"));
        assert!(text.contains("api_token: abc123"));
    }

    #[tokio::test]
    async fn test_unknown_notifier() {
        let temp_dir = TempDir::new().unwrap();
        let domain = domain(&temp_dir);
        assert!(domain.get("slack").await.unwrap_err().is_not_found());
        assert!(domain
            .update("slack", Mapping::new())
            .await
            .unwrap_err()
            .is_not_found());
    }
}
