//! Paths and settings of one AlarmFW installation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConsoleError;

/// Default run configuration handed to the execution engine.
pub const DEFAULT_RUN_CONFIG: &str = "/config/run_local.yaml";

/// Wall-clock limit for one execution run.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(120);

/// Name of the document the compiler owns inside the generated directory.
pub const GENERATED_FILE_NAME: &str = "ocp_pod_health.yaml";

/// Where alarm state is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    /// JSON event documents in `<state>/outbox`.
    #[default]
    Outbox,
    /// The engine's `<state>/alarmfw.sqlite` database.
    Sqlite,
}

impl FromStr for StateBackend {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "outbox" => Ok(Self::Outbox),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConsoleError::InvalidArgument {
                reason: format!("unknown state backend '{other}' (expected outbox or sqlite)"),
            }),
        }
    }
}

impl fmt::Display for StateBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Outbox => "outbox",
            Self::Sqlite => "sqlite",
        })
    }
}

/// Locations the console reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
    pub secrets_dir: PathBuf,
    pub env_file: PathBuf,
    pub run_config: String,
    pub run_timeout: Duration,
    pub state_backend: StateBackend,
}

impl ConsoleConfig {
    /// Conventional layout under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_dir: root.join("config"),
            state_dir: root.join("state"),
            secrets_dir: root.join("secrets"),
            env_file: root.join(".env"),
            run_config: DEFAULT_RUN_CONFIG.to_string(),
            run_timeout: DEFAULT_RUN_TIMEOUT,
            state_backend: StateBackend::default(),
            root,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// - `ALARMFW_ROOT`: installation root (default: current directory)
    /// - `ALARMFW_CONFIG`, `ALARMFW_STATE`, `ALARMFW_SECRETS`, `ALARMFW_ENV`:
    ///   override the directories derived from the root
    /// - `COMPOSE_RUN_CONFIG`: run configuration passed to the engine
    /// - `ALARMFW_STATE_BACKEND`: `outbox` (default) or `sqlite`; unknown
    ///   values keep the default
    #[must_use]
    pub fn from_env() -> Self {
        let root = std::env::var("ALARMFW_ROOT").unwrap_or_else(|_| ".".to_string());
        let mut config = Self::new(root);
        if let Ok(dir) = std::env::var("ALARMFW_CONFIG") {
            config.config_dir = dir.into();
        }
        if let Ok(dir) = std::env::var("ALARMFW_STATE") {
            config.state_dir = dir.into();
        }
        if let Ok(dir) = std::env::var("ALARMFW_SECRETS") {
            config.secrets_dir = dir.into();
        }
        if let Ok(file) = std::env::var("ALARMFW_ENV") {
            config.env_file = file.into();
        }
        if let Ok(run_config) = std::env::var("COMPOSE_RUN_CONFIG") {
            config.run_config = run_config;
        }
        if let Some(backend) = std::env::var("ALARMFW_STATE_BACKEND")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.state_backend = backend;
        }
        config
    }

    fn legacy_dir(&self) -> PathBuf {
        self.config_dir
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("legacy")
            .join("podhealthalarm")
    }

    pub fn namespaces_dir(&self) -> PathBuf {
        self.legacy_dir().join("conf.d")
    }

    pub fn clusters_dir(&self) -> PathBuf {
        self.legacy_dir().join("clusters.d")
    }

    pub fn generated_dir(&self) -> PathBuf {
        self.config_dir.join("generated")
    }

    pub fn checks_dir(&self) -> PathBuf {
        self.config_dir.join("checks")
    }

    pub fn notifiers_dir(&self) -> PathBuf {
        self.config_dir.join("notifiers")
    }

    pub fn dedup_policy_file(&self) -> PathBuf {
        self.config_dir.join("policies").join("dedup.yaml")
    }

    pub fn outbox_dir(&self) -> PathBuf {
        self.state_dir.join("outbox")
    }

    pub fn state_db(&self) -> PathBuf {
        self.state_dir.join("alarmfw.sqlite")
    }

    pub fn compose_file(&self) -> PathBuf {
        self.root.join("docker-compose.yml")
    }
}
