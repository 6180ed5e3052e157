//! Per-cluster credential files (`<secrets>/<cluster>.token`).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use super::fs_util::{list_files, stem, write_atomic};
use crate::entities::validate_name;
use crate::errors::{ConsoleError, ConsoleResult};

const TOKEN_EXTENSION: &str = "token";
const KIND: &str = "Secret";

/// Metadata of a stored credential. The contents are never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretInfo {
    /// File name, e.g. `east.token`.
    pub name: String,
    pub cluster: String,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SecretStore {
    dir: PathBuf,
}

impl SecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, cluster: &str) -> PathBuf {
        self.dir.join(format!("{cluster}.{TOKEN_EXTENSION}"))
    }

    pub async fn list(&self) -> ConsoleResult<Vec<SecretInfo>> {
        let mut secrets = Vec::new();
        for path in list_files(&self.dir, TOKEN_EXTENSION).await? {
            let metadata = fs::metadata(&path).await?;
            secrets.push(SecretInfo {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                cluster: stem(&path),
                size_bytes: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        Ok(secrets)
    }

    /// Whether a credential exists, without reading it.
    pub async fn exists(&self, cluster: &str) -> bool {
        validate_name(KIND, cluster).is_ok()
            && fs::try_exists(self.path_for(cluster)).await.unwrap_or(false)
    }

    /// Store a credential, readable by the owner only.
    pub async fn put(&self, cluster: &str, token: &str) -> ConsoleResult<SecretInfo> {
        validate_name(KIND, cluster)?;
        let token = token.trim();
        if token.is_empty() {
            return Err(ConsoleError::InvalidArgument {
                reason: "token is required".to_string(),
            });
        }

        let path = self.path_for(cluster);
        write_atomic(&path, token).await?;
        restrict_permissions(&path).await?;
        info!(cluster, "Cluster credential stored");

        let metadata = fs::metadata(&path).await?;
        Ok(SecretInfo {
            name: format!("{cluster}.{TOKEN_EXTENSION}"),
            cluster: cluster.to_string(),
            size_bytes: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    pub async fn delete(&self, cluster: &str) -> ConsoleResult<()> {
        validate_name(KIND, cluster)?;
        match fs::remove_file(self.path_for(cluster)).await {
            Ok(()) => {
                info!(cluster, "Cluster credential deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConsoleError::not_found(KIND, format!("{cluster}.{TOKEN_EXTENSION}")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> ConsoleResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| ConsoleError::FileWrite {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> ConsoleResult<()> {
    Ok(())
}
