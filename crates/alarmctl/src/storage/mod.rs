//! Storage layer: the file and table backed collaborators the console reads
//! and writes.

mod conf;
mod env;
mod fs_util;
mod generated;
mod registry;
mod secrets;
pub mod state;

pub use conf::{parse_conf, render_conf, ConfMap};
pub use env::{is_sensitive_key, EnvSnapshot, EnvironmentStore, MASK};
pub(crate) use env::indirection_key;
pub use generated::{GeneratedStore, TopologyCheck};
pub use registry::{ClusterRegistry, ConfRecord, ConfRegistry, NamespaceRegistry};
pub use secrets::{SecretInfo, SecretStore};
pub use state::{OutboxStateStore, SqliteStateStore, StateStore};

pub(crate) use fs_util::{list_files, read_text, write_atomic};
