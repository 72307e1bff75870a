// src/cli.rs
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::discovery::KUBECTL_ENV;
use crate::output::OutputFormat;

pub const PASSWORD_ENV: &str = "DEVCTL_SSH_PASSWORD";

#[derive(Parser)]
#[command(name = "devctl", version, about = "Directory of environments and their cluster credentials")]
pub struct Args {
    /// State directory, defaults to $DEVCTL_HOME or ~/.devctl
    #[arg(long, global = true)]
    pub home: Option<String>,
    #[arg(long, global = true, env = KUBECTL_ENV, default_value = "kubectl")]
    pub kubectl: String,
    #[arg(short, long, global = true)]
    pub debug: bool,
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage registered environments
    #[command(subcommand)]
    Env(EnvCommand),
    /// Inspect and register clusters of an environment
    #[command(subcommand)]
    Cluster(ClusterCommand),
    /// Materialize a cluster's kubeconfig and print its path
    Kubeconfig { env: String, cluster: String },
}

#[derive(Subcommand)]
pub enum EnvCommand {
    List,
    Show {
        id: String,
    },
    Add(AddEnv),
    Update(UpdateEnv),
    Delete {
        id: String,
    },
}

#[derive(ClapArgs)]
pub struct AddEnv {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub host: String,
    #[arg(long, default_value = "root")]
    pub user: String,
    #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
    pub password: String,
}

#[derive(ClapArgs)]
pub struct UpdateEnv {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Subcommand)]
pub enum ClusterCommand {
    /// Workload clusters known to the management cluster
    List { env: String },
    /// Clusters whose kubeconfig can be resolved
    Secrets { env: String },
    /// Clusters with a kubeconfig in the local cache
    Cached { env: String },
    Nodes { env: String, cluster: String },
    /// Register a cluster from a kubeconfig file, `-` reads stdin
    Add {
        env: String,
        cluster: String,
        file: PathBuf,
    },
    Delete { env: String, cluster: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_nested_cluster_command() {
        let args = Args::try_parse_from(["devctl", "-o", "json", "cluster", "nodes", "prod-1", "wk-7"]).unwrap();
        assert_eq!(args.output, OutputFormat::Json);
        match args.command {
            Command::Cluster(ClusterCommand::Nodes { env, cluster }) => {
                assert_eq!(env, "prod-1");
                assert_eq!(cluster, "wk-7");
            }
            _ => panic!("unexpected command"),
        }
    }
}
