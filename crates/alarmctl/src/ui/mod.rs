//! Terminal UI helpers for console output.
//!
//! This module uses println! for CLI output, which is appropriate
//! for terminal user interfaces.

#![allow(clippy::disallowed_macros)]

use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::domain::{CatalogEntry, CompileReport, NotifierView, SkipReason};
use crate::entities::{
    AlarmStateRecord, AlarmStatus, ClusterView, ItemFailure, JobStatus, MonitorSnapshot,
    NamespaceDefinition,
};
use crate::storage::SecretInfo;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn header(table: &mut Table, titles: &[&str]) {
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(titles.iter().map(|t| Cell::new(t).fg(Color::Cyan)));
}

fn flag(on: bool) -> Cell {
    if on {
        Cell::new("yes").fg(Color::Green)
    } else {
        Cell::new("no").fg(Color::DarkGrey)
    }
}

fn or_dash(text: &str) -> &str {
    if text.is_empty() {
        "-"
    } else {
        text
    }
}

fn status_color(status: AlarmStatus) -> Color {
    match status {
        AlarmStatus::Problem => Color::Red,
        AlarmStatus::Error => Color::Magenta,
        AlarmStatus::Ok => Color::Green,
        AlarmStatus::Unknown => Color::DarkGrey,
    }
}

/// Scalar YAML values as plain text, anything else as flow YAML.
fn yaml_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Create a table for displaying namespaces
pub fn namespace_table(namespaces: &[NamespaceDefinition]) -> Table {
    let mut table = Table::new();
    header(
        &mut table,
        &["Namespace", "Enabled", "Clusters", "Zabbix", "Mail", "Severity", "Department"],
    );

    for ns in namespaces {
        table.add_row(vec![
            Cell::new(&ns.name),
            flag(ns.enabled),
            Cell::new(or_dash(&ns.clusters.join(", "))),
            flag(ns.zabbix_enabled),
            flag(ns.mail_enabled),
            Cell::new(&ns.severity),
            Cell::new(or_dash(&ns.department)),
        ]);
    }

    table
}

/// Create a table for displaying clusters
pub fn cluster_table(clusters: &[ClusterView]) -> Table {
    let mut table = Table::new();
    header(&mut table, &["Cluster", "API endpoint", "Insecure TLS", "Token"]);

    for cluster in clusters {
        let token = if cluster.has_token {
            Cell::new("present").fg(Color::Green)
        } else {
            Cell::new("missing").fg(Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(&cluster.name),
            Cell::new(or_dash(&cluster.api_endpoint)),
            flag(cluster.insecure_tls),
            token,
        ]);
    }

    table
}

/// Create a table for displaying active problems
pub fn snapshot_table(snapshots: &[MonitorSnapshot]) -> Table {
    let mut table = Table::new();
    header(
        &mut table,
        &["Namespace", "Cluster", "Status", "Since", "Resources", "Alarm"],
    );

    for snapshot in snapshots {
        table.add_row(vec![
            Cell::new(&snapshot.namespace),
            Cell::new(&snapshot.cluster),
            Cell::new(snapshot.status).fg(status_color(snapshot.status)),
            Cell::new(snapshot.last_change_ts.format(TIME_FORMAT)),
            Cell::new(snapshot.resources.len()),
            Cell::new(&snapshot.alarm_name).fg(Color::DarkGrey),
        ]);
    }

    table
}

/// Create a table for displaying alarm state records
pub fn alarm_table(records: &[AlarmStateRecord]) -> Table {
    let mut table = Table::new();
    header(&mut table, &["Changed", "Status", "Alarm", "Last sent", "Dedup key"]);

    for record in records {
        let sent = record
            .last_sent_ts
            .map(|ts| ts.format(TIME_FORMAT).to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(record.last_change_ts.format(TIME_FORMAT)),
            Cell::new(record.last_status).fg(status_color(record.last_status)),
            Cell::new(or_dash(&record.alarm_name)),
            Cell::new(sent),
            Cell::new(&record.dedup_key).fg(Color::DarkGrey),
        ]);
    }

    table
}

/// Create a table for displaying stored cluster tokens
pub fn secret_table(secrets: &[SecretInfo]) -> Table {
    let mut table = Table::new();
    header(&mut table, &["File", "Cluster", "Size", "Modified"]);

    for secret in secrets {
        let modified = secret
            .modified
            .map(|ts| ts.format(TIME_FORMAT).to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&secret.name),
            Cell::new(&secret.cluster),
            Cell::new(format!("{} B", secret.size_bytes)),
            Cell::new(modified),
        ]);
    }

    table
}

/// Create a table for displaying the check catalog
pub fn check_table(checks: &[CatalogEntry]) -> Table {
    let mut table = Table::new();
    header(&mut table, &["Check", "Type", "Source", "Generated"]);

    for check in checks {
        table.add_row(vec![
            Cell::new(&check.name),
            Cell::new(&check.check_type),
            Cell::new(&check.source_file).fg(Color::DarkGrey),
            flag(check.generated),
        ]);
    }

    table
}

/// Create a key/value table, e.g. for environment values
pub fn key_value_table(values: &IndexMap<String, String>) -> Table {
    let mut table = Table::new();
    header(&mut table, &["Key", "Value"]);
    for (key, value) in values {
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }
    table
}

/// Create a key/value table from a YAML mapping
pub fn mapping_table(fields: &Mapping) -> Table {
    let mut table = Table::new();
    header(&mut table, &["Field", "Value"]);
    for (key, value) in fields {
        table.add_row(vec![Cell::new(yaml_text(key)), Cell::new(yaml_text(value))]);
    }
    table
}

/// Display one notifier with its masked fields
pub fn display_notifier(notifier: &NotifierView) {
    println!(
        "{} {} {}",
        "Notifier".cyan().bold(),
        notifier.name.cyan().bold(),
        format!("({})", notifier.source_file).dimmed()
    );
    println!("{}", mapping_table(&notifier.fields));
}

/// Display one cluster in detail
pub fn display_cluster(cluster: &ClusterView) {
    println!("{} {}", "Cluster".cyan().bold(), cluster.name.cyan().bold());
    println!("{}: {}", "API endpoint".bold(), or_dash(&cluster.api_endpoint));
    println!("{}: {}", "Insecure TLS".bold(), cluster.insecure_tls);
    println!(
        "{}: {}",
        "Token".bold(),
        if cluster.has_token {
            "present".green()
        } else {
            "missing".yellow()
        }
    );
}

/// Display one namespace in detail
pub fn display_namespace(ns: &NamespaceDefinition) {
    println!("{}", "═".repeat(60).dimmed());
    println!(
        "{} {} {}",
        "Namespace".cyan().bold(),
        ns.name.cyan().bold(),
        if ns.enabled {
            "[enabled]".green()
        } else {
            "[disabled]".yellow()
        }
    );
    println!("{}", "═".repeat(60).dimmed());

    println!("{}: {}", "Clusters".bold(), or_dash(&ns.clusters.join(", ")));
    println!("{}: {}", "Zabbix".bold(), ns.zabbix_enabled);
    println!("{}: {}", "Mail".bold(), ns.mail_enabled);
    println!("{}: {}", "Severity".bold(), ns.severity);
    println!("{}: {}", "Node".bold(), or_dash(&ns.node));
    println!("{}: {}", "Department".bold(), or_dash(&ns.department));
    println!("{}: {}", "Alert key".bold(), ns.alert_key);
    println!("{}: {}", "Alert group".bold(), or_dash(&ns.alert_group));
    if ns.mail_enabled {
        println!("{}: {}", "Mail to".bold(), or_dash(&ns.mail_to));
        println!("{}: {}", "Mail cc".bold(), or_dash(&ns.mail_cc));
    }
}

fn skip_reason_text(reason: &SkipReason) -> String {
    match reason {
        SkipReason::UndefinedCluster => "cluster is not defined".to_string(),
        SkipReason::UnresolvedEndpoint { token } => format!("{token} is not set"),
        SkipReason::EmptyEndpoint => "endpoint is empty".to_string(),
    }
}

/// Display the outcome of a compile
pub fn display_compile_report(report: &CompileReport) {
    print_success(&format!("Compiled {} check(s)", report.checks));

    if !report.skipped.is_empty() {
        println!();
        println!("{} ({})", "Skipped".bold().underline(), report.skipped.len());
        for skip in &report.skipped {
            println!(
                "  {} {}/{} - {}",
                "•".dimmed(),
                skip.namespace,
                skip.cluster,
                skip_reason_text(&skip.reason)
            );
        }
    }

    display_failures(&report.failures);
}

/// Display sources that were left out of a bulk read
pub fn display_failures(failures: &[ItemFailure]) {
    if failures.is_empty() {
        return;
    }
    println!();
    print_warning(&format!("{} source(s) could not be read", failures.len()));
    for failure in failures {
        println!("  {} {}: {}", "•".dimmed(), failure.path, failure.reason);
    }
}

/// Display the execution slot
pub fn display_run_status(status: &JobStatus) {
    match status {
        JobStatus::Idle => print_info("No run recorded"),
        JobStatus::Running { config, started_at } => print_info(&format!(
            "Run with {config} in progress since {}",
            started_at.format(TIME_FORMAT)
        )),
        JobStatus::Completed(outcome) => {
            let summary = format!(
                "Run with {} exited {} after {:.1}s",
                outcome.config, outcome.exit_code, outcome.duration_secs
            );
            if outcome.succeeded() {
                print_success(&summary);
            } else {
                print_error(&summary);
            }
            if !outcome.stdout.is_empty() {
                println!();
                println!("{}", "Output".bold().underline());
                println!("{}", outcome.stdout);
            }
            if !outcome.stderr.is_empty() {
                println!();
                println!("{}", "Errors".bold().underline());
                println!("{}", outcome.stderr.red());
            }
        }
        JobStatus::Failed { config, reason } => {
            print_error(&format!("Run with {config} failed: {reason}"));
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_text() {
        assert_eq!(yaml_text(&Value::Null), "");
        assert_eq!(yaml_text(&Value::from("smtp")), "smtp");
        assert_eq!(yaml_text(&Value::from(587_u64)), "587");
        let list: Value = serde_yaml::from_str("[a, b]").unwrap();
        assert_eq!(yaml_text(&list), "- a\n- b");
    }

    #[test]
    fn test_namespace_table_lists_clusters() {
        let ns = NamespaceDefinition::new("billing").with_clusters(["east", "west"]);
        let rendered = namespace_table(&[ns]).to_string();
        assert!(rendered.contains("billing"));
        assert!(rendered.contains("east, west"));
    }

    #[test]
    fn test_skip_reason_text() {
        let reason = SkipReason::UnresolvedEndpoint {
            token: "${OCP_API_EAST}".to_string(),
        };
        assert_eq!(skip_reason_text(&reason), "${OCP_API_EAST} is not set");
    }
}
