//! alarmctl - operations console for the AlarmFW monitoring framework.

#![allow(clippy::disallowed_macros)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use alarmctl::config::DEFAULT_RUN_CONFIG;
use alarmctl::domain::Console;
use alarmctl::entities::{AlarmStatus, ClusterDefinition, NamespaceDefinition};
use alarmctl::ui;
use alarmctl::{ConsoleConfig, StateBackend};

/// AlarmFW operations console.
#[derive(Parser)]
#[command(name = "alarmctl")]
#[command(about = "Manage AlarmFW namespaces, clusters and checks, and inspect alarm state")]
#[command(version)]
struct Cli {
    /// Installation root
    #[arg(long, env = "ALARMFW_ROOT", default_value = ".", global = true)]
    root: PathBuf,

    /// Configuration directory (default: <root>/config)
    #[arg(long, env = "ALARMFW_CONFIG", global = true)]
    config_dir: Option<PathBuf>,

    /// State directory (default: <root>/state)
    #[arg(long, env = "ALARMFW_STATE", global = true)]
    state_dir: Option<PathBuf>,

    /// Cluster token directory (default: <root>/secrets)
    #[arg(long, env = "ALARMFW_SECRETS", global = true)]
    secrets_dir: Option<PathBuf>,

    /// Environment file (default: <root>/.env)
    #[arg(long, env = "ALARMFW_ENV", global = true)]
    env_file: Option<PathBuf>,

    /// Where alarm state is read from
    #[arg(long, env = "ALARMFW_STATE_BACKEND", default_value_t = StateBackend::Outbox, global = true)]
    state_backend: StateBackend,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// Log line format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Regenerate the pod health checks from the registries
    Compile,

    /// Namespace registry
    Namespace {
        #[command(subcommand)]
        action: NamespaceCommand,
    },

    /// Cluster registry
    Cluster {
        #[command(subcommand)]
        action: ClusterCommand,
    },

    /// Environment values (sensitive values are masked)
    Env {
        #[command(subcommand)]
        action: EnvCommand,
    },

    /// Topology and active problems
    Monitor {
        #[command(subcommand)]
        action: MonitorCommand,
    },

    /// Cluster API tokens
    Secret {
        #[command(subcommand)]
        action: SecretCommand,
    },

    /// Notifier credentials
    Notifier {
        #[command(subcommand)]
        action: NotifierCommand,
    },

    /// Dedup policy
    Policy {
        #[command(subcommand)]
        action: PolicyCommand,
    },

    /// Check catalog
    Check {
        #[command(subcommand)]
        action: CheckCommand,
    },

    /// Alarm state history
    Alarm {
        #[command(subcommand)]
        action: AlarmCommand,
    },

    /// Execution engine runs (one at a time per installation)
    Run {
        #[command(subcommand)]
        action: RunCommand,
    },
}

#[derive(Subcommand)]
enum RunCommand {
    /// Run the engine once and wait for it
    Start {
        /// Run configuration passed to the engine
        #[arg(long, env = "COMPOSE_RUN_CONFIG", default_value = DEFAULT_RUN_CONFIG)]
        config: String,

        /// Wall-clock limit in seconds
        #[arg(long, default_value = "120")]
        timeout: u64,
    },
    /// Show the current or last run
    Status,
}

#[derive(Subcommand)]
enum NamespaceCommand {
    /// List namespaces
    List,
    /// Show one namespace
    Get { name: String },
    /// Create or update a namespace; unset options keep their stored value
    Put {
        name: String,
        /// Target clusters (comma separated)
        #[arg(long, value_delimiter = ',')]
        clusters: Option<Vec<String>>,
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        zabbix: Option<bool>,
        #[arg(long)]
        mail: Option<bool>,
        #[arg(long)]
        severity: Option<String>,
        #[arg(long)]
        node: Option<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        alert_key: Option<String>,
        #[arg(long)]
        alert_group: Option<String>,
        #[arg(long)]
        mail_to: Option<String>,
        #[arg(long)]
        mail_cc: Option<String>,
    },
    /// Delete a namespace
    Delete { name: String },
}

#[derive(Subcommand)]
enum ClusterCommand {
    /// List clusters with resolved endpoints
    List,
    /// Show one cluster
    Get { name: String },
    /// Create or update a cluster
    Put {
        name: String,
        /// API URL or an indirection such as ${OCP_API_EAST}
        #[arg(long)]
        api: Option<String>,
        #[arg(long)]
        insecure_tls: Option<bool>,
        /// Also store this API token for the cluster
        #[arg(long)]
        token: Option<String>,
    },
    /// Delete a cluster (its token is kept)
    Delete { name: String },
}

#[derive(Subcommand)]
enum EnvCommand {
    /// List values, sensitive ones masked
    List,
    /// Set one value
    Set { key: String, value: String },
    /// Set several KEY=VALUE pairs in one write
    Update {
        #[arg(required = true)]
        assignments: Vec<String>,
    },
}

#[derive(Subcommand)]
enum MonitorCommand {
    /// Active problems, newest record per namespace and cluster
    Pods {
        #[arg(long)]
        cluster: Option<String>,
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Namespaces known from topology and state
    Namespaces,
    /// Clusters known from topology and state
    Clusters,
}

#[derive(Subcommand)]
enum SecretCommand {
    /// List stored tokens (contents are never shown)
    List,
    /// Store a cluster token
    Put {
        cluster: String,
        #[arg(long, conflicts_with = "from_file", required_unless_present = "from_file")]
        token: Option<String>,
        /// Read the token from a file
        #[arg(long)]
        from_file: Option<PathBuf>,
    },
    /// Delete a cluster token
    Delete { cluster: String },
}

#[derive(Subcommand)]
enum NotifierCommand {
    /// List notifiers
    List,
    /// Show one notifier
    Get { name: String },
    /// Set notifier fields as key=value pairs
    Set {
        name: String,
        #[arg(required = true)]
        fields: Vec<String>,
    },
}

#[derive(Subcommand)]
enum PolicyCommand {
    /// Show the dedup policy
    Get,
    /// Set policy fields as key=value pairs (values are YAML scalars)
    Set {
        #[arg(required = true)]
        fields: Vec<String>,
    },
}

#[derive(Subcommand)]
enum CheckCommand {
    /// List every check across hand-written and generated documents
    List,
    /// Show one check
    Get { name: String },
    /// Add a hand-written check from a YAML file holding one check mapping
    Create { file: PathBuf },
    /// Replace a hand-written check in place from a YAML file holding one check mapping
    Update { name: String, file: PathBuf },
    /// Delete a hand-written check
    Delete { name: String },
}

#[derive(Subcommand)]
enum AlarmCommand {
    /// Most recent alarm state records
    Recent {
        #[arg(long, default_value = "50")]
        limit: usize,
        /// Only records with this status (problem, ok, error)
        #[arg(long, value_parser = parse_status)]
        status: Option<AlarmStatus>,
    },
    /// Active problems and whether alarm state could be read
    State {
        #[arg(long)]
        cluster: Option<String>,
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Remove every outbox document
    Clear,
}

fn parse_status(label: &str) -> Result<AlarmStatus, String> {
    match AlarmStatus::from_label(label) {
        AlarmStatus::Unknown => Err(format!("unknown status '{label}'")),
        status => Ok(status),
    }
}

fn split_assignment(text: &str) -> Result<(&str, &str)> {
    text.split_once('=')
        .map(|(k, v)| (k.trim(), v))
        .filter(|(k, _)| !k.is_empty())
        .with_context(|| format!("expected KEY=VALUE, got '{text}'"))
}

/// `key=value` pairs as a mapping; `scalars` parses values as YAML scalars.
fn assignments(pairs: &[String], scalars: bool) -> Result<Mapping> {
    let mut mapping = Mapping::new();
    for pair in pairs {
        let (key, value) = split_assignment(pair)?;
        let value = if scalars {
            serde_yaml::from_str::<Value>(value)
                .ok()
                .filter(|v| !v.is_mapping() && !v.is_sequence())
                .unwrap_or_else(|| Value::String(value.to_string()))
        } else {
            Value::String(value.to_string())
        };
        mapping.insert(Value::String(key.to_string()), value);
    }
    Ok(mapping)
}

fn init_tracing(verbose: bool, log_format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("alarmctl=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match log_format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn console_config(cli: &Cli) -> ConsoleConfig {
    let mut config = ConsoleConfig::new(&cli.root);
    if let Some(dir) = &cli.config_dir {
        config.config_dir.clone_from(dir);
    }
    if let Some(dir) = &cli.state_dir {
        config.state_dir.clone_from(dir);
    }
    if let Some(dir) = &cli.secrets_dir {
        config.secrets_dir.clone_from(dir);
    }
    if let Some(file) = &cli.env_file {
        config.env_file.clone_from(file);
    }
    config.state_backend = cli.state_backend;
    config
}

struct Output {
    format: OutputFormat,
}

impl Output {
    /// Print `value` as JSON, or run `text` for terminal output.
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => text(),
        }
        Ok(())
    }

    fn done(&self, message: &str, value: &serde_json::Value) -> Result<()> {
        self.emit(value, || ui::print_success(message))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let config = console_config(&cli);
    tracing::debug!(root = %config.root.display(), backend = %config.state_backend, "Starting");
    let out = Output { format: cli.format };

    match cli.command {
        Commands::Compile => {
            let report = Console::new(config).compile_report().await?;
            out.emit(&report, || ui::display_compile_report(&report))
        }
        Commands::Namespace { action } => run_namespace(&Console::new(config), &out, action).await,
        Commands::Cluster { action } => run_cluster(&Console::new(config), &out, action).await,
        Commands::Env { action } => run_env(&Console::new(config), &out, action).await,
        Commands::Monitor { action } => run_monitor(&Console::new(config), &out, action).await,
        Commands::Secret { action } => run_secret(&Console::new(config), &out, action).await,
        Commands::Notifier { action } => run_notifier(&Console::new(config), &out, action).await,
        Commands::Policy { action } => run_policy(&Console::new(config), &out, action).await,
        Commands::Check { action } => run_check(&Console::new(config), &out, action).await,
        Commands::Alarm { action } => run_alarm(&Console::new(config), &out, action).await,
        Commands::Run { action } => run_engine(config, &out, action).await,
    }
}

async fn run_namespace(console: &Console, out: &Output, action: NamespaceCommand) -> Result<()> {
    let domain = console.namespace_domain();
    match action {
        NamespaceCommand::List => {
            let listing = domain.listing().await?;
            out.emit(&listing, || {
                println!("{}", ui::namespace_table(&listing.items));
                ui::display_failures(&listing.failures);
            })
        }
        NamespaceCommand::Get { name } => {
            let ns = domain.get(&name).await?;
            out.emit(&ns, || ui::display_namespace(&ns))
        }
        NamespaceCommand::Put {
            name,
            clusters,
            enabled,
            zabbix,
            mail,
            severity,
            node,
            department,
            alert_key,
            alert_group,
            mail_to,
            mail_cc,
        } => {
            let mut ns = match domain.get(&name).await {
                Ok(existing) => existing,
                Err(e) if e.is_not_found() => NamespaceDefinition::new(&name),
                Err(e) => return Err(e.into()),
            };
            if let Some(clusters) = clusters {
                ns.clusters = clusters;
            }
            ns.enabled = enabled.unwrap_or(ns.enabled);
            ns.zabbix_enabled = zabbix.unwrap_or(ns.zabbix_enabled);
            ns.mail_enabled = mail.unwrap_or(ns.mail_enabled);
            for (field, value) in [
                (&mut ns.severity, severity),
                (&mut ns.node, node),
                (&mut ns.department, department),
                (&mut ns.alert_key, alert_key),
                (&mut ns.alert_group, alert_group),
                (&mut ns.mail_to, mail_to),
                (&mut ns.mail_cc, mail_cc),
            ] {
                if let Some(value) = value {
                    *field = value;
                }
            }

            let checks = console.upsert_namespace(&name, ns).await?;
            out.done(
                &format!("Namespace '{name}' saved ({checks} checks generated)"),
                &serde_json::json!({ "name": name, "checks": checks }),
            )
        }
        NamespaceCommand::Delete { name } => {
            let checks = console.delete_namespace(&name).await?;
            out.done(
                &format!("Namespace '{name}' deleted ({checks} checks generated)"),
                &serde_json::json!({ "name": name, "checks": checks }),
            )
        }
    }
}

async fn run_cluster(console: &Console, out: &Output, action: ClusterCommand) -> Result<()> {
    let domain = console.cluster_domain();
    match action {
        ClusterCommand::List => {
            let clusters = domain.list().await?;
            out.emit(&clusters, || println!("{}", ui::cluster_table(&clusters)))
        }
        ClusterCommand::Get { name } => {
            let cluster = domain.get(&name).await?;
            out.emit(&cluster, || ui::display_cluster(&cluster))
        }
        ClusterCommand::Put {
            name,
            api,
            insecure_tls,
            token,
        } => {
            let mut cluster = match domain.definition(&name).await {
                Ok(existing) => existing,
                Err(e) if e.is_not_found() => ClusterDefinition::new(&name, ""),
                Err(e) => return Err(e.into()),
            };
            if let Some(api) = api {
                cluster.api_endpoint = api;
            }
            cluster.insecure_tls = insecure_tls.unwrap_or(cluster.insecure_tls);

            if let Some(token) = token {
                console.secrets().put(&name, &token).await?;
            }
            let checks = console.upsert_cluster(&name, cluster).await?;
            out.done(
                &format!("Cluster '{name}' saved ({checks} checks generated)"),
                &serde_json::json!({ "name": name, "checks": checks }),
            )
        }
        ClusterCommand::Delete { name } => {
            let checks = console.delete_cluster(&name).await?;
            out.done(
                &format!("Cluster '{name}' deleted ({checks} checks generated)"),
                &serde_json::json!({ "name": name, "checks": checks }),
            )
        }
    }
}

async fn run_env(console: &Console, out: &Output, action: EnvCommand) -> Result<()> {
    let env = console.env();
    match action {
        EnvCommand::List => {
            let values = env.list_masked().await?;
            out.emit(&values, || println!("{}", ui::key_value_table(&values)))
        }
        EnvCommand::Set { key, value } => {
            let written = env.set(&key, &value).await?;
            let message = if written {
                format!("{key} updated")
            } else {
                format!("{key} unchanged (masked value)")
            };
            out.done(&message, &serde_json::json!({ "key": key, "written": written }))
        }
        EnvCommand::Update { assignments } => {
            let pairs = assignments
                .iter()
                .map(|a| split_assignment(a))
                .collect::<Result<Vec<_>>>()?;
            let updated = env.update(pairs).await?;
            out.done(
                &format!("{} key(s) updated", updated.len()),
                &serde_json::json!({ "updated": updated }),
            )
        }
    }
}

async fn run_monitor(console: &Console, out: &Output, action: MonitorCommand) -> Result<()> {
    match action {
        MonitorCommand::Pods { cluster, namespace } => {
            let report = console
                .report(cluster.as_deref(), namespace.as_deref())
                .await;
            out.emit(&report.snapshots, || {
                if !report.state_available {
                    ui::print_warning("Alarm state could not be read");
                } else if report.snapshots.is_empty() {
                    ui::print_success("No active problems");
                } else {
                    println!("{}", ui::snapshot_table(&report.snapshots));
                }
            })
        }
        MonitorCommand::Namespaces => {
            let names = console.namespaces().await?;
            out.emit(&names, || names.iter().for_each(|n| println!("{n}")))
        }
        MonitorCommand::Clusters => {
            let names = console.clusters().await?;
            out.emit(&names, || names.iter().for_each(|n| println!("{n}")))
        }
    }
}

async fn run_secret(console: &Console, out: &Output, action: SecretCommand) -> Result<()> {
    let secrets = console.secrets();
    match action {
        SecretCommand::List => {
            let list = secrets.list().await?;
            out.emit(&list, || println!("{}", ui::secret_table(&list)))
        }
        SecretCommand::Put {
            cluster,
            token,
            from_file,
        } => {
            let token = match (token, from_file) {
                (Some(token), _) => token,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => bail!("either --token or --from-file is required"),
            };
            let info = secrets.put(&cluster, &token).await?;
            out.emit(&info, || {
                ui::print_success(&format!("Token for '{cluster}' stored ({} bytes)", info.size_bytes));
            })
        }
        SecretCommand::Delete { cluster } => {
            secrets.delete(&cluster).await?;
            out.done(
                &format!("Token for '{cluster}' deleted"),
                &serde_json::json!({ "cluster": cluster }),
            )
        }
    }
}

async fn run_notifier(console: &Console, out: &Output, action: NotifierCommand) -> Result<()> {
    let notifiers = console.notifiers();
    match action {
        NotifierCommand::List => {
            let list = notifiers.list().await?;
            out.emit(&list, || list.iter().for_each(ui::display_notifier))
        }
        NotifierCommand::Get { name } => {
            let notifier = notifiers.get(&name).await?;
            out.emit(&notifier, || ui::display_notifier(&notifier))
        }
        NotifierCommand::Set { name, fields } => {
            let written = notifiers.update(&name, assignments(&fields, false)?).await?;
            out.done(
                &format!("Notifier '{name}' updated: {}", written.join(", ")),
                &serde_json::json!({ "name": name, "updated": written }),
            )
        }
    }
}

async fn run_policy(console: &Console, out: &Output, action: PolicyCommand) -> Result<()> {
    let policy = match action {
        PolicyCommand::Get => console.policies().get().await?,
        PolicyCommand::Set { fields } => console.policies().update(assignments(&fields, true)?).await?,
    };
    out.emit(&policy, || println!("{}", ui::mapping_table(&policy)))
}

async fn run_check(console: &Console, out: &Output, action: CheckCommand) -> Result<()> {
    let checks = console.checks();
    match action {
        CheckCommand::List => {
            let listing = checks.list().await?;
            out.emit(&listing, || {
                println!("{}", ui::check_table(&listing.items));
                ui::display_failures(&listing.failures);
            })
        }
        CheckCommand::Get { name } => {
            let entry = checks.get(&name).await?;
            out.emit(&entry, || {
                println!("{}", ui::mapping_table(&entry.definition));
                ui::print_info(&format!("Declared in {}", entry.source_file));
            })
        }
        CheckCommand::Create { file } => {
            let entry = checks.create(read_check_file(&file).await?).await?;
            out.emit(&entry, || {
                ui::print_success(&format!("Check '{}' written to {}", entry.name, entry.source_file));
            })
        }
        CheckCommand::Update { name, file } => {
            let entry = checks.update(&name, read_check_file(&file).await?).await?;
            out.emit(&entry, || {
                ui::print_success(&format!("Check '{}' updated in {}", entry.name, entry.source_file));
            })
        }
        CheckCommand::Delete { name } => {
            checks.delete(&name).await?;
            out.done(
                &format!("Check '{name}' deleted"),
                &serde_json::json!({ "name": name }),
            )
        }
    }
}

async fn read_check_file(file: &Path) -> Result<Mapping> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("{} is not a YAML mapping", file.display()))
}

async fn run_alarm(console: &Console, out: &Output, action: AlarmCommand) -> Result<()> {
    match action {
        AlarmCommand::Recent { limit, status } => {
            let records = console.state().recent(limit, status).await?;
            out.emit(&records, || println!("{}", ui::alarm_table(&records)))
        }
        AlarmCommand::State { cluster, namespace } => {
            let report = console
                .report(cluster.as_deref(), namespace.as_deref())
                .await;
            out.emit(&report, || {
                if report.state_available {
                    ui::print_info(&format!("{} active problem(s)", report.snapshots.len()));
                    if !report.snapshots.is_empty() {
                        println!("{}", ui::snapshot_table(&report.snapshots));
                    }
                } else {
                    ui::print_warning("Alarm state unavailable");
                }
            })
        }
        AlarmCommand::Clear => {
            let removed = console.outbox().clear().await?;
            out.done(
                &format!("Removed {removed} outbox document(s)"),
                &serde_json::json!({ "removed": removed }),
            )
        }
    }
}

async fn run_engine(mut config: ConsoleConfig, out: &Output, action: RunCommand) -> Result<()> {
    match action {
        RunCommand::Start {
            config: run_config,
            timeout,
        } => {
            config.run_config = run_config;
            config.run_timeout = Duration::from_secs(timeout);
            let console = Console::new(config);
            let result = console.run(None).await;
            let status = console.runs().status().await?;
            out.emit(&status, || ui::display_run_status(&status))?;

            match result {
                Ok(outcome) if outcome.succeeded() => Ok(()),
                Ok(outcome) => bail!("engine exited with code {}", outcome.exit_code),
                Err(e) => Err(e.into()),
            }
        }
        RunCommand::Status => {
            let status = Console::new(config).runs().status().await?;
            out.emit(&status, || ui::display_run_status(&status))
        }
    }
}
