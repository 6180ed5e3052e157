//! Domain facades for the operations console.
//!
//! Each facade combines storage operations with the decision logic of one
//! concern; [`Console`] wires them together for an installation.

mod checks;
mod clusters;
mod compiler;
mod console;
mod monitor;
mod namespaces;
mod notifiers;
mod policies;
mod runs;

pub use checks::{CatalogEntry, ChecksDomain};
pub use clusters::ClustersDomain;
pub use compiler::{compile_checks, CompileReport, ConfigCompiler, SkipReason, Skipped};
pub use console::Console;
pub use monitor::{latest_per_scope, select_snapshots, TopologyReconciler};
pub use namespaces::NamespacesDomain;
pub use notifiers::{NotifierView, NotifiersDomain};
pub use policies::PoliciesDomain;
pub use runs::{
    ComposeExecutor, RunExecutor, RunRegister, RunService, STALE_GRACE, STDERR_TAIL_BYTES,
    STDOUT_TAIL_BYTES,
};
