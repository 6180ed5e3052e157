//! Flat environment store backed by a `KEY=value` file.
//!
//! Every call re-reads the backing file and every write rewrites it whole, so
//! concurrent editors are last-writer-wins.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info};

use super::fs_util::{read_text, write_atomic};
use crate::errors::{ConsoleError, ConsoleResult};

/// Placeholder returned instead of sensitive values.
pub const MASK: &str = "***";

/// Key fragments that mark a value as sensitive (matched case-insensitively).
const SENSITIVE_TOKENS: [&str; 5] = ["TOKEN", "PASS", "PASSWORD", "SECRET", "KEY"];

/// Whether a key's value must never be shown in cleartext.
pub fn is_sensitive_key(key: &str) -> bool {
    let upper = key.to_uppercase();
    SENSITIVE_TOKENS.iter().any(|t| upper.contains(t))
}

/// In-memory view of the environment file at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: IndexMap<String, String>,
}

impl EnvSnapshot {
    /// Parse `KEY=value` lines. Values are kept verbatim apart from trimming.
    pub fn parse(text: &str) -> Self {
        let mut vars = IndexMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                vars.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Self { vars }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.vars {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Resolve a possible `${NAME}` indirection.
    ///
    /// Literals come back unchanged; an indirection whose key is absent also
    /// comes back unchanged. Never fails.
    pub fn resolve(&self, token: &str) -> String {
        self.try_resolve(token)
            .map_or_else(|| token.to_string(), str::to_string)
    }

    /// Like [`resolve`](Self::resolve) but `None` when an indirection names an
    /// absent key.
    pub fn try_resolve<'a>(&'a self, token: &'a str) -> Option<&'a str> {
        match indirection_key(token) {
            Some(key) => self.get(key),
            None => Some(token),
        }
    }

    /// Every key with sensitive, non-empty values replaced by [`MASK`].
    pub fn masked(&self) -> IndexMap<String, String> {
        self.vars
            .iter()
            .map(|(k, v)| {
                let shown = if is_sensitive_key(k) && !v.is_empty() {
                    MASK.to_string()
                } else {
                    v.clone()
                };
                (k.clone(), shown)
            })
            .collect()
    }
}

/// The variable name inside `${NAME}`, if `token` is an indirection.
pub(crate) fn indirection_key(token: &str) -> Option<&str> {
    token
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
}

/// Environment file store.
#[derive(Debug, Clone)]
pub struct EnvironmentStore {
    path: PathBuf,
}

impl EnvironmentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current contents. A missing file is an empty environment.
    pub async fn snapshot(&self) -> ConsoleResult<EnvSnapshot> {
        Ok(read_text(&self.path)
            .await?
            .map(|text| EnvSnapshot::parse(&text))
            .unwrap_or_default())
    }

    pub async fn get(&self, key: &str) -> ConsoleResult<Option<String>> {
        Ok(self.snapshot().await?.get(key).map(str::to_string))
    }

    pub async fn resolve(&self, token: &str) -> ConsoleResult<String> {
        Ok(self.snapshot().await?.resolve(token))
    }

    pub async fn list_masked(&self) -> ConsoleResult<IndexMap<String, String>> {
        Ok(self.snapshot().await?.masked())
    }

    /// Set one key. Writing the mask placeholder is ignored so a round-tripped
    /// masked listing never clobbers the real value.
    ///
    /// Returns whether the store was written.
    pub async fn set(&self, key: &str, value: &str) -> ConsoleResult<bool> {
        let updated = self.update([(key, value)]).await?;
        Ok(!updated.is_empty())
    }

    /// Set several keys in one rewrite. Returns the keys actually written.
    pub async fn update<'a, I>(&self, pairs: I) -> ConsoleResult<Vec<String>>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut pending = Vec::new();
        for (key, value) in pairs {
            validate_assignment(key, value)?;
            if value == MASK {
                debug!(key, "Ignoring masked placeholder write");
                continue;
            }
            pending.push((key.to_string(), value.to_string()));
        }
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut snapshot = self.snapshot().await?;
        let keys: Vec<String> = pending.iter().map(|(k, _)| k.clone()).collect();
        for (key, value) in pending {
            snapshot.insert(key, value);
        }
        write_atomic(&self.path, &snapshot.render()).await?;
        info!(keys = ?keys, "Environment updated");
        Ok(keys)
    }
}

fn validate_assignment(key: &str, value: &str) -> ConsoleResult<()> {
    let key_ok = !key.trim().is_empty()
        && key.trim() == key
        && !key.contains(['=', '\n', '\r', '#']);
    if !key_ok {
        return Err(ConsoleError::InvalidArgument {
            reason: format!("invalid environment key '{key}'"),
        });
    }
    if value.contains(['\n', '\r']) {
        return Err(ConsoleError::InvalidArgument {
            reason: format!("value for '{key}' must be a single line"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, EnvironmentStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = EnvironmentStore::new(temp_dir.path().join(".env"));
        (temp_dir, store)
    }

    #[test]
    fn test_sensitive_keys() {
        for key in ["ZABBIX_TOKEN", "smtp_password", "DB_PASS", "MY_SECRET", "API_KEY", "Keycloak"] {
            assert!(is_sensitive_key(key), "{key} should be sensitive");
        }
        for key in ["OCP_API_EAST", "PROMETHEUS_URL", "MAIL_TO"] {
            assert!(!is_sensitive_key(key), "{key} should not be sensitive");
        }
    }

    #[test]
    fn test_resolve() {
        let env = EnvSnapshot::parse("FOO=https://x\nEMPTY=\n");
        assert_eq!(env.resolve("${FOO}"), "https://x");
        assert_eq!(env.resolve("${BAR}"), "${BAR}");
        assert_eq!(env.resolve("https://literal"), "https://literal");
        assert_eq!(env.resolve("${FOO"), "${FOO");
        assert_eq!(env.try_resolve("${FOO}"), Some("https://x"));
        assert_eq!(env.try_resolve("${BAR}"), None);
        assert_eq!(env.try_resolve("${EMPTY}"), Some(""));
        assert_eq!(env.try_resolve("plain"), Some("plain"));
    }

    #[test]
    fn test_masked_listing() {
        let env = EnvSnapshot::parse("ZABBIX_TOKEN=abc\nOCP_API_EAST=https://east\nSMTP_PASSWORD=\n");
        let masked = env.masked();
        assert_eq!(masked["ZABBIX_TOKEN"], MASK);
        assert_eq!(masked["OCP_API_EAST"], "https://east");
        assert_eq!(masked["SMTP_PASSWORD"], "");
    }

    #[tokio::test]
    async fn test_set_preserves_order_and_rewrites() {
        let (_temp_dir, store) = store();
        assert!(store.set("B", "2").await.unwrap());
        assert!(store.set("A", "1").await.unwrap());
        assert!(store.set("B", "3").await.unwrap());

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "B=3\nA=1\n");
        assert_eq!(store.get("B").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_mask_write_is_noop() {
        let (_temp_dir, store) = store();
        store.set("ZABBIX_TOKEN", "real-secret").await.unwrap();

        assert!(!store.set("ZABBIX_TOKEN", MASK).await.unwrap());
        assert_eq!(
            store.get("ZABBIX_TOKEN").await.unwrap().as_deref(),
            Some("real-secret")
        );

        let masked = store.list_masked().await.unwrap();
        assert_eq!(masked["ZABBIX_TOKEN"], MASK);
    }

    #[tokio::test]
    async fn test_update_skips_masked_values() {
        let (_temp_dir, store) = store();
        store.set("SMTP_PASSWORD", "hunter2").await.unwrap();

        let updated = store
            .update([("SMTP_PASSWORD", MASK), ("SMTP_HOST", "mail.example")])
            .await
            .unwrap();
        assert_eq!(updated, vec!["SMTP_HOST"]);
        assert_eq!(
            store.get("SMTP_PASSWORD").await.unwrap().as_deref(),
            Some("hunter2")
        );
    }

    #[tokio::test]
    async fn test_rejects_bad_assignments() {
        let (_temp_dir, store) = store();
        assert!(store.set("", "x").await.is_err());
        assert!(store.set("A=B", "x").await.is_err());
        assert!(store.set("A", "line1\nline2").await.is_err());
    }
}
