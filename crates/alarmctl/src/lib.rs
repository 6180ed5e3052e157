//! # alarmctl
//!
//! Operations console for the AlarmFW monitoring framework.
//!
//! This crate provides:
//! - Namespace and cluster registries stored as legacy `key="value"` files
//! - A compiler that turns the registries into generated pod-health checks
//! - A topology reconciler that reads alarm state (outbox or SQLite) and
//!   reports the currently failing `(namespace, cluster)` pairs
//! - Editors for environment values, cluster tokens, notifier credentials,
//!   the dedup policy and hand-written checks
//! - A guarded trigger for one execution-engine run at a time
//!
//! ## Example
//!
//! ```rust,ignore
//! use alarmctl::{Console, ConsoleConfig};
//!
//! let console = Console::new(ConsoleConfig::from_env());
//! let count = console.compile().await?;
//! let problems = console.snapshots(Some("east"), None).await;
//! ```

// Paths and settings
pub mod config;

// Core entities
pub mod entities;

// Error types
pub mod errors;

// Storage layer
pub mod storage;

// Domain facades
pub mod domain;

// Terminal UI helpers
pub mod ui;

// Re-export key types for convenience
pub use config::{ConsoleConfig, StateBackend};
pub use domain::{CompileReport, Console, ConfigCompiler, TopologyReconciler};
pub use entities::{
    AlarmStateRecord, AlarmStatus, CheckSpec, ClusterDefinition, ClusterView, JobStatus, Listing,
    MonitorReport, MonitorSnapshot, NamespaceDefinition, NotificationRoute, RunOutcome, ScopeKey,
};
pub use errors::{ConsoleError, ConsoleResult};
pub use storage::{EnvironmentStore, StateStore};
