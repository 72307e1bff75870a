// src/output.rs
use serde::Serialize;
use std::path::Path;
use tabled::{Table, Tabled};

use crate::types::{timestamp, ClusterRecord, Environment, NodeInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

/// What the CLI shows of an environment; the SSH password never leaves the registry.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentView<'a> {
    id: &'a str,
    name: &'a str,
    host: &'a str,
    user: &'a str,
    created: String,
    updated: String,
    kubeconfig: String,
}

impl<'a> From<&'a Environment> for EnvironmentView<'a> {
    fn from(env: &'a Environment) -> Self {
        Self {
            id: &env.id,
            name: &env.display_name,
            host: &env.host,
            user: &env.ssh_user,
            created: env.created_at.format(timestamp::FORMAT).to_string(),
            updated: env.updated_at.format(timestamp::FORMAT).to_string(),
            kubeconfig: env.management_kubeconfig.display().to_string(),
        }
    }
}

#[derive(Tabled)]
struct EnvironmentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "HOST")]
    host: String,
    #[tabled(rename = "USER")]
    user: String,
    #[tabled(rename = "UPDATED")]
    updated: String,
}

impl From<&EnvironmentView<'_>> for EnvironmentRow {
    fn from(view: &EnvironmentView<'_>) -> Self {
        Self {
            id: view.id.to_string(),
            name: view.name.to_string(),
            host: view.host.to_string(),
            user: view.user.to_string(),
            updated: view.updated.clone(),
        }
    }
}

#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "REGION")]
    region: String,
    #[tabled(rename = "PLATFORM")]
    platform: String,
    #[tabled(rename = "VERSION")]
    version: String,
    #[tabled(rename = "API SERVER")]
    api_server: String,
    #[tabled(rename = "STATUS")]
    status: &'static str,
}

impl From<&ClusterRecord> for ClusterRow {
    fn from(c: &ClusterRecord) -> Self {
        Self {
            id: c.id.clone(),
            name: c.display_name.clone(),
            region: c.region.clone(),
            platform: format!("{}/{}", c.os, c.arch),
            version: c.kubernetes_version.clone(),
            api_server: c.api_server_endpoint.clone(),
            status: c.ready.as_str(),
        }
    }
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "INTERNAL IP")]
    internal_ip: String,
}

#[derive(Tabled)]
struct ClusterIdRow {
    #[tabled(rename = "CLUSTER")]
    id: String,
}

fn print_serialized<T: Serialize + ?Sized>(data: &T, format: OutputFormat) -> Result<(), String> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data).map_err(|e| e.to_string())?,
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string())?,
        OutputFormat::Table => return Ok(()),
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("No results found");
        return;
    }
    println!("{}", Table::new(rows));
}

pub fn print_environments(envs: &[Environment], format: OutputFormat) -> Result<(), String> {
    let views: Vec<EnvironmentView> = envs.iter().map(EnvironmentView::from).collect();
    if format != OutputFormat::Table {
        return print_serialized(&views, format);
    }
    print_table(views.iter().map(EnvironmentRow::from).collect());
    Ok(())
}

pub fn print_environment(env: &Environment, format: OutputFormat) -> Result<(), String> {
    let view = EnvironmentView::from(env);
    match format {
        OutputFormat::Table => print_serialized(&view, OutputFormat::Yaml),
        other => print_serialized(&view, other),
    }
}

pub fn print_clusters(clusters: &[ClusterRecord], format: OutputFormat) -> Result<(), String> {
    if format != OutputFormat::Table {
        return print_serialized(clusters, format);
    }
    print_table(clusters.iter().map(ClusterRow::from).collect());
    Ok(())
}

pub fn print_ids(ids: &[String], format: OutputFormat) -> Result<(), String> {
    if format != OutputFormat::Table {
        return print_serialized(ids, format);
    }
    print_table(ids.iter().map(|id| ClusterIdRow { id: id.clone() }).collect());
    Ok(())
}

pub fn print_nodes(nodes: &[NodeInfo], format: OutputFormat) -> Result<(), String> {
    if format != OutputFormat::Table {
        return print_serialized(nodes, format);
    }
    let rows = nodes
        .iter()
        .map(|n| NodeRow {
            name: n.name.clone(),
            internal_ip: n.internal_ip.clone(),
        })
        .collect();
    print_table(rows);
    Ok(())
}

/// Bare path on stdout so it can be substituted into another command line.
pub fn print_path(path: &Path) {
    println!("{}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_columns_are_aligned() {
        let envs = [
            Environment::local_default("/home/op/.kube/config".into()),
            Environment::new("prod-1", "Prod", "10.0.0.5", "root", "hunter2"),
        ];
        let views: Vec<EnvironmentView> = envs.iter().map(EnvironmentView::from).collect();
        let rendered = Table::new(views.iter().map(EnvironmentRow::from)).to_string();

        let header = rendered.lines().find(|l| l.contains("HOST")).unwrap();
        let row = rendered.lines().find(|l| l.contains("10.0.0.5")).unwrap();
        assert_eq!(header.find("HOST"), row.find("10.0.0.5"));
        assert!(header.find("ID") < header.find("NAME"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn environment_view_omits_password() {
        let env = Environment::new("prod-1", "Prod", "10.0.0.5", "root", "hunter2");
        let json = serde_json::to_string(&EnvironmentView::from(&env)).unwrap();
        assert!(json.contains("10.0.0.5"));
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn cluster_rows_combine_platform_and_status() {
        let record = ClusterRecord {
            id: "wk-7".into(),
            display_name: "Workload 7".into(),
            os: "linux".into(),
            arch: "amd64".into(),
            region: "cn-north-1".into(),
            container_runtime: "containerd".into(),
            kubernetes_version: "v1.28.3".into(),
            api_server_endpoint: "10.0.0.7:6443".into(),
            ready: crate::types::ReadyState::Ready,
            kubeconfig_secret_name: "wk-7-kubeconfig".into(),
        };
        let rendered = Table::new([ClusterRow::from(&record)]).to_string();
        assert!(rendered.contains("linux/amd64"));
        assert!(rendered.contains("ready"));
        assert!(rendered.contains("API SERVER"));
    }
}
