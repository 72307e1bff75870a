// src/app/run.rs
use std::error::Error;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use super::{ClusterDirectory, EnvironmentRegistry};
use crate::cli::{AddEnv, Args, ClusterCommand, Command, EnvCommand, UpdateEnv};
use crate::config::{self, Paths};
use crate::discovery::{KubectlConnector, SshBootstrap};
use crate::error::DirectoryError;
use crate::output::{self, OutputFormat};
use crate::types::Environment;

pub type RunResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Executes one CLI command. Blocking; the caller runs it off the async runtime.
pub fn run(args: Args, paths: Paths) -> RunResult {
    let mut registry = EnvironmentRegistry::open(&paths, SshBootstrap::new())?;
    if let Err(e) = registry.ensure_local_default_bootstrapped(config::ambient_kubeconfig) {
        warn!("Could not register the default environment: {}", e);
    }

    let format = args.output;
    let connector = KubectlConnector::new(args.kubectl);
    match args.command {
        Command::Env(cmd) => run_env(&mut registry, cmd, format),
        Command::Cluster(cmd) => run_cluster(&registry, connector, cmd, format),
        Command::Kubeconfig { env, cluster } => {
            let directory = ClusterDirectory::open(&env, &registry, connector)?;
            output::print_path(&directory.resolve_kubeconfig(&cluster)?);
            Ok(())
        }
    }
}

fn run_env(registry: &mut EnvironmentRegistry<SshBootstrap>, cmd: EnvCommand, format: OutputFormat) -> RunResult {
    match cmd {
        EnvCommand::List => output::print_environments(registry.list(), format)?,
        EnvCommand::Show { id } => output::print_environment(registry.get(&id)?, format)?,
        EnvCommand::Add(add) => {
            let id = add.id.clone();
            registry.add(candidate_from(add))?;
            println!("Environment {} added", id);
        }
        EnvCommand::Update(update) => {
            let id = update.id.clone();
            let merged = merge_update(registry.get(&id)?, update);
            registry.update(merged)?;
            println!("Environment {} updated", id);
        }
        EnvCommand::Delete { id } => {
            registry.delete(&id)?;
            println!("Environment {} deleted", id);
        }
    }
    Ok(())
}

fn run_cluster(
    registry: &EnvironmentRegistry<SshBootstrap>,
    connector: KubectlConnector,
    cmd: ClusterCommand,
    format: OutputFormat,
) -> RunResult {
    match cmd {
        ClusterCommand::List { env } => {
            let directory = ClusterDirectory::open(&env, registry, connector)?;
            output::print_clusters(&directory.list_clusters()?, format)?;
        }
        ClusterCommand::Secrets { env } => {
            let directory = ClusterDirectory::open(&env, registry, connector)?;
            output::print_ids(&directory.list_cluster_secrets()?, format)?;
        }
        ClusterCommand::Cached { env } => {
            let directory = ClusterDirectory::open(&env, registry, connector)?;
            output::print_ids(&directory.cached_clusters()?, format)?;
        }
        ClusterCommand::Nodes { env, cluster } => {
            let directory = ClusterDirectory::open(&env, registry, connector)?;
            output::print_nodes(&directory.list_cluster_nodes(&cluster)?, format)?;
        }
        ClusterCommand::Add { env, cluster, file } => {
            let directory = ClusterDirectory::open(&env, registry, connector)?;
            let kubeconfig = read_kubeconfig(&file)?;
            directory.register_cluster(&cluster, &kubeconfig)?;
            info!("Registered cluster {} in {}", cluster, env);
            println!("Cluster {} registered in {}", cluster, env);
        }
        ClusterCommand::Delete { env, cluster } => {
            let directory = ClusterDirectory::open(&env, registry, connector)?;
            directory.deregister_cluster(&cluster)?;
            println!("Cluster {} deregistered from {}", cluster, env);
        }
    }
    Ok(())
}

fn candidate_from(add: AddEnv) -> Environment {
    let name = add.name.unwrap_or_else(|| add.id.clone());
    Environment::new(add.id, name, add.host, add.user, add.password)
}

fn merge_update(current: &Environment, update: UpdateEnv) -> Environment {
    let mut merged = current.clone();
    if let Some(name) = update.name {
        merged.display_name = name;
    }
    if let Some(host) = update.host {
        merged.host = host;
    }
    if let Some(user) = update.user {
        merged.ssh_user = user;
    }
    if let Some(password) = update.password {
        merged.ssh_password = password;
    }
    merged
}

fn read_kubeconfig(file: &Path) -> Result<Vec<u8>, DirectoryError> {
    if file == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| DirectoryError::io("read", Path::new("<stdin>"), e))?;
        return Ok(buf);
    }
    std::fs::read(file).map_err(|e| DirectoryError::io("read", file, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(id: &str) -> UpdateEnv {
        UpdateEnv {
            id: id.into(),
            name: None,
            host: None,
            user: None,
            password: None,
        }
    }

    #[test]
    fn update_only_touches_given_fields() {
        let current = Environment::new("prod-1", "Prod", "10.0.0.5", "root", "pw");
        let mut change = update("prod-1");
        change.host = Some("10.0.0.6".into());

        let merged = merge_update(&current, change);
        assert_eq!(merged.host, "10.0.0.6");
        assert_eq!(merged.display_name, "Prod");
        assert_eq!(merged.ssh_password, "pw");
    }

    #[test]
    fn display_name_defaults_to_id() {
        let env = candidate_from(AddEnv {
            id: "prod-1".into(),
            name: None,
            host: "10.0.0.5".into(),
            user: "root".into(),
            password: "pw".into(),
        });
        assert_eq!(env.display_name, "prod-1");
    }

    #[test]
    fn kubeconfig_is_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("wk-7.yaml");
        std::fs::write(&file, "apiVersion: v1").unwrap();
        assert_eq!(read_kubeconfig(&file).unwrap(), b"apiVersion: v1");
        assert!(read_kubeconfig(&dir.path().join("missing")).is_err());
    }
}
