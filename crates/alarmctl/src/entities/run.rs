//! Execution run status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a finished execution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub config: String,
    pub exit_code: i32,
    /// Tail of the captured standard output.
    pub stdout: String,
    /// Tail of the captured standard error.
    pub stderr: String,
    pub duration_secs: f64,
    pub started_at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// State of the single execution slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Idle,
    Running {
        config: String,
        started_at: DateTime<Utc>,
    },
    Completed(RunOutcome),
    Failed {
        config: String,
        reason: String,
    },
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running { .. } => "running",
            Self::Completed(_) => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}
