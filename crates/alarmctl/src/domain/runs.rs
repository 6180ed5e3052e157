//! Execution runs: at most one engine run at a time.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_RUN_TIMEOUT;
use crate::entities::{JobStatus, RunOutcome};
use crate::errors::{ConsoleError, ConsoleResult};
use crate::storage::{read_text, write_atomic};

/// Bytes of standard output kept from a run.
pub const STDOUT_TAIL_BYTES: usize = 8000;

/// Bytes of standard error kept from a run.
pub const STDERR_TAIL_BYTES: usize = 2000;

/// Added to the run timeout before a leftover lock counts as abandoned.
pub const STALE_GRACE: Duration = Duration::from_secs(60);

/// Last `max_bytes` of `text`, cut on a character boundary.
fn tail(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

const LOCK_FILE: &str = "run.lock";
const STATUS_FILE: &str = "run_status.json";

/// Contents of the lock file, for conflict messages.
#[derive(Debug, Serialize, Deserialize)]
struct LockHolder {
    config: String,
    pid: u32,
    started_at: DateTime<Utc>,
}

/// Single-slot register of the current or last run, shared by every process
/// working on one installation.
///
/// The slot is claimed by creating `run.lock` exclusively; the status of the
/// current or last run is kept in `run_status.json` beside it.
#[derive(Debug, Clone)]
pub struct RunRegister {
    lock_path: PathBuf,
    status_path: PathBuf,
    stale_after: Duration,
}

impl RunRegister {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        let state_dir = state_dir.as_ref();
        Self {
            lock_path: state_dir.join(LOCK_FILE),
            status_path: state_dir.join(STATUS_FILE),
            stale_after: DEFAULT_RUN_TIMEOUT + STALE_GRACE,
        }
    }

    /// A lock older than this was left by a process that died mid-run.
    #[must_use]
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// The current or last run. A `Running` status without a lock means the
    /// process holding the slot went away before recording a result.
    pub async fn status(&self) -> ConsoleResult<JobStatus> {
        let Some(text) = read_text(&self.status_path).await? else {
            return Ok(JobStatus::Idle);
        };
        let status: JobStatus =
            serde_json::from_str(&text).map_err(|e| ConsoleError::Malformed {
                path: self.status_path.display().to_string(),
                reason: e.to_string(),
            })?;
        if let JobStatus::Running { config, .. } = &status {
            if !fs::try_exists(&self.lock_path).await.unwrap_or(false) {
                return Ok(JobStatus::Failed {
                    config: config.clone(),
                    reason: "run ended without recording a result".to_string(),
                });
            }
        }
        Ok(status)
    }

    async fn store(&self, status: &JobStatus) -> ConsoleResult<()> {
        write_atomic(&self.status_path, &serde_json::to_string_pretty(status)?).await
    }

    async fn holder(&self) -> Option<LockHolder> {
        let text = read_text(&self.lock_path).await.ok()??;
        serde_json::from_str(&text).ok()
    }

    async fn is_stale(&self) -> bool {
        match fs::metadata(&self.lock_path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified
                .elapsed()
                .is_ok_and(|age| age >= self.stale_after),
            Err(_) => false,
        }
    }

    async fn release(&self) {
        match fs::remove_file(&self.lock_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.lock_path.display(), error = %e, "Failed to release run lock"),
        }
    }

    async fn claim(&self, holder: &LockHolder) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .await?;
        let body = serde_json::to_vec(holder).map_err(std::io::Error::other)?;
        file.write_all(&body).await?;
        file.flush().await
    }

    /// Move to `Running` unless a run is already in flight anywhere.
    pub async fn try_start(&self, config: &str) -> ConsoleResult<DateTime<Utc>> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let started_at = Utc::now();
        let holder = LockHolder {
            config: config.to_string(),
            pid: std::process::id(),
            started_at,
        };

        for reclaimed in [false, true] {
            match self.claim(&holder).await {
                Ok(()) => {
                    let running = JobStatus::Running {
                        config: config.to_string(),
                        started_at,
                    };
                    if let Err(e) = self.store(&running).await {
                        self.release().await;
                        return Err(e);
                    }
                    debug!(config, pid = holder.pid, "Run slot claimed");
                    return Ok(started_at);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !reclaimed && self.is_stale().await {
                        warn!(path = %self.lock_path.display(), "Reclaiming stale run lock");
                        self.release().await;
                        continue;
                    }
                    break;
                }
                Err(e) => {
                    return Err(ConsoleError::FileWrite {
                        path: self.lock_path.display().to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        }

        Err(ConsoleError::Conflict {
            reason: match self.holder().await {
                Some(current) => format!(
                    "a run with '{}' is already in progress (pid {})",
                    current.config, current.pid
                ),
                None => "a run is already in progress".to_string(),
            },
        })
    }

    async fn finish(&self, status: JobStatus) -> ConsoleResult<()> {
        let stored = self.store(&status).await;
        self.release().await;
        stored
    }

    pub async fn complete(&self, outcome: RunOutcome) -> ConsoleResult<()> {
        self.finish(JobStatus::Completed(outcome)).await
    }

    pub async fn fail(&self, config: &str, reason: impl Into<String>) -> ConsoleResult<()> {
        self.finish(JobStatus::Failed {
            config: config.to_string(),
            reason: reason.into(),
        })
        .await
    }
}

/// Runs the execution engine once.
#[async_trait]
pub trait RunExecutor: Send + Sync {
    async fn execute(&self, config: &str) -> ConsoleResult<RunOutcome>;
}

/// Runs the engine through `docker compose`.
#[derive(Debug, Clone)]
pub struct ComposeExecutor {
    compose_file: PathBuf,
    working_dir: Option<PathBuf>,
    service: String,
    timeout: Duration,
}

impl ComposeExecutor {
    pub fn new(compose_file: impl Into<PathBuf>) -> Self {
        Self {
            compose_file: compose_file.into(),
            working_dir: None,
            service: "alarmfw".to_string(),
            timeout: DEFAULT_RUN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Directory relative paths in the compose file resolve against.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn command(&self, config: &str) -> Command {
        let mut command = Command::new("docker");
        command
            .arg("compose")
            .arg("-f")
            .arg(&self.compose_file)
            .args(["run", "--rm", self.service.as_str(), "run", "--config", config])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait]
impl RunExecutor for ComposeExecutor {
    async fn execute(&self, config: &str) -> ConsoleResult<RunOutcome> {
        let started_at = Utc::now();
        let clock = Instant::now();
        debug!(compose_file = %self.compose_file.display(), config, "Starting engine run");

        let child = self.command(config).spawn().map_err(|e| ConsoleError::Execution {
            reason: format!("failed to start docker compose: {e}"),
        })?;
        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ConsoleError::Execution {
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ConsoleError::Execution {
                    reason: format!("Timeout after {}s", self.timeout.as_secs()),
                })
            }
        };

        Ok(RunOutcome {
            config: config.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: tail(&String::from_utf8_lossy(&output.stdout), STDOUT_TAIL_BYTES),
            stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_BYTES),
            duration_secs: clock.elapsed().as_secs_f64(),
            started_at,
        })
    }
}

/// Guards the executor with the register.
#[derive(Clone)]
pub struct RunService {
    register: RunRegister,
    executor: Arc<dyn RunExecutor>,
}

impl RunService {
    pub fn new(register: RunRegister, executor: Arc<dyn RunExecutor>) -> Self {
        Self { register, executor }
    }

    /// The current or last run, as recorded by any process.
    pub async fn status(&self) -> ConsoleResult<JobStatus> {
        self.register.status().await
    }

    async fn execute_registered(&self, config: &str) -> ConsoleResult<RunOutcome> {
        let result = self.executor.execute(config).await;
        let recorded = match &result {
            Ok(outcome) => {
                info!(config, exit_code = outcome.exit_code, duration_secs = outcome.duration_secs, "Run finished");
                self.register.complete(outcome.clone()).await
            }
            Err(e) => {
                warn!(config, error = %e, "Run failed");
                self.register.fail(config, e.to_string()).await
            }
        };
        if let Err(e) = recorded {
            warn!(config, error = %e, "Failed to record run status");
        }
        result
    }

    /// Run to completion. Fails with `Conflict` if a run is in flight.
    pub async fn run(&self, config: &str) -> ConsoleResult<RunOutcome> {
        self.register.try_start(config).await?;
        self.execute_registered(config).await
    }

    /// Claim the slot now and run in the background.
    ///
    /// The conflict check happens before this returns, so a second caller is
    /// rejected even if the first run has not been polled yet.
    pub async fn spawn(
        &self,
        config: &str,
    ) -> ConsoleResult<JoinHandle<ConsoleResult<RunOutcome>>> {
        self.register.try_start(config).await?;
        let service = self.clone();
        let config = config.to_string();
        Ok(tokio::spawn(async move {
            service.execute_registered(&config).await
        }))
    }
}
