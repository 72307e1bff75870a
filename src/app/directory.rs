// src/app/directory.rs
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

use super::EnvironmentRegistry;
use crate::cache::CredentialCache;
use crate::discovery::{
    ApiConnector, KubeConfig, ManagementApi, RemoteBootstrap, ResourceRef, SecretObject,
    SshTarget, REMOTE_KUBECONFIG,
};
use crate::error::{DirectoryError, IoContext, ResourceKind, Result};
use crate::types::{
    validate_id, ClusterRecord, Environment, NodeInfo, ReadyState, MANAGEMENT_CLUSTER_ID,
};

pub const CLUSTER_NAMESPACE: &str = "jd-tpaas";
pub const CLUSTER_RESOURCE: ResourceRef = ResourceRef {
    group: "infrastructure.cluster.x-k8s.io",
    version: "v1beta1",
    plural: "jdosclusters",
};
pub const KUBECONFIG_SECRET_TYPE: &str = "cluster.x-k8s.io/secret";
pub const KUBECONFIG_SECRET_SUFFIX: &str = "-kubeconfig";
pub const KUBECONFIG_DATA_KEY: &str = "value";
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";
pub const DISPLAY_NAME_LABEL: &str = "cos.jdcloud.com/display-name";
pub const KUBECONFIG_SECRET_LABEL: &str = "cos.jdcloud.com/kubeconfig-secret";

pub fn secret_name(cluster_id: &str) -> String {
    format!("{}{}", cluster_id, KUBECONFIG_SECRET_SUFFIX)
}

fn text_at<'a>(value: &'a Value, path: &[&str]) -> &'a str {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn api_server_endpoint(spec: Option<&Value>) -> String {
    let Some(endpoint) = spec.and_then(|s| s.get("controlPlaneEndpoint")) else {
        return String::new();
    };
    let host = ["url", "host"]
        .iter()
        .find_map(|key| endpoint.get(key).and_then(Value::as_str))
        .unwrap_or_default();
    let port = match endpoint.get("port") {
        Some(Value::Number(n)) => n.as_u64().map(|p| p.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };
    match (host, port) {
        ("", _) => String::new(),
        (host, Some(port)) => format!("{}:{}", host, port),
        (host, None) => host.to_string(),
    }
}

/// Maps one custom resource item; fields that are missing or have an
/// unexpected shape render as empty.
fn cluster_record(item: &Value) -> Option<ClusterRecord> {
    let id = text_at(item, &["metadata", "name"]);
    if id.is_empty() {
        return None;
    }
    let label = |key: &str| text_at(item, &["metadata", "labels", key]).to_string();
    let spec = |key: &str| text_at(item, &["spec", key]).to_string();

    Some(ClusterRecord {
        id: id.to_string(),
        display_name: label(DISPLAY_NAME_LABEL),
        os: spec("os"),
        arch: spec("arch"),
        region: spec("region"),
        container_runtime: spec("containerRuntime"),
        kubernetes_version: spec("kubernetesVersion"),
        api_server_endpoint: api_server_endpoint(item.get("spec")),
        ready: ReadyState::from_value(item.get("status").and_then(|s| s.get("ready"))),
        kubeconfig_secret_name: label(KUBECONFIG_SECRET_LABEL),
    })
}

/// Workload cluster ids share the environment directory with the
/// management cluster's `config` file.
fn validate_workload_id(cluster_id: &str) -> Result<()> {
    validate_id("cluster id", cluster_id)?;
    if cluster_id == crate::cache::MANAGEMENT_FILE {
        return Err(DirectoryError::Invalid {
            field: "cluster id",
            reason: format!("`{}` is reserved for the management cluster", cluster_id),
        });
    }
    Ok(())
}

/// Workload clusters reachable through one environment's management cluster.
pub struct ClusterDirectory<'r, B, C> {
    registry: &'r EnvironmentRegistry<B>,
    environment: &'r Environment,
    connector: C,
}

impl<'r, B: RemoteBootstrap, C: ApiConnector> ClusterDirectory<'r, B, C> {
    pub fn open(env_id: &str, registry: &'r EnvironmentRegistry<B>, connector: C) -> Result<Self> {
        let environment = registry.get(env_id)?;
        Ok(Self {
            registry,
            environment,
            connector,
        })
    }

    fn cache(&self) -> &CredentialCache {
        self.registry.cache()
    }

    fn management_api(&self) -> Result<C::Api> {
        self.connector.connect(&self.environment.management_kubeconfig)
    }

    pub fn list_clusters(&self) -> Result<Vec<ClusterRecord>> {
        info!("Listing clusters for environment: {}", self.environment.id);
        let items = self
            .management_api()?
            .list_objects(&CLUSTER_RESOURCE, CLUSTER_NAMESPACE)
            .map_err(|e| {
                error!("Failed to list {}: {}", CLUSTER_RESOURCE.plural, e);
                e
            })?;
        let clusters: Vec<_> = items.iter().filter_map(cluster_record).collect();
        info!("Found {} clusters", clusters.len());
        Ok(clusters)
    }

    /// `gaia` followed by every cluster with a kubeconfig secret.
    pub fn list_cluster_secrets(&self) -> Result<Vec<String>> {
        info!("Listing cluster secrets for environment: {}", self.environment.id);
        let secrets = self
            .management_api()?
            .list_secrets(CLUSTER_NAMESPACE, CLUSTER_NAME_LABEL)?;

        let mut ids = vec![MANAGEMENT_CLUSTER_ID.to_string()];
        ids.extend(
            secrets
                .iter()
                .filter(|s| s.secret_type == KUBECONFIG_SECRET_TYPE)
                .filter_map(|s| s.name.strip_suffix(KUBECONFIG_SECRET_SUFFIX))
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        );
        info!("Found {} clusters", ids.len());
        Ok(ids)
    }

    /// Materializes a fresh kubeconfig for `cluster_id` in the cache and
    /// returns its path. The authoritative source is consulted every time.
    pub fn resolve_kubeconfig(&self, cluster_id: &str) -> Result<PathBuf> {
        info!("Getting kubeconfig for cluster: {}", cluster_id);
        if cluster_id == MANAGEMENT_CLUSTER_ID {
            return self.resolve_management();
        }
        validate_workload_id(cluster_id)?;

        let name = secret_name(cluster_id);
        let secret = self
            .management_api()?
            .get_secret(CLUSTER_NAMESPACE, &name)?
            .ok_or_else(|| {
                error!("Secret {} not found", name);
                DirectoryError::not_found(ResourceKind::Secret, name.clone())
            })?;
        let payload = match secret.data.get(KUBECONFIG_DATA_KEY) {
            Some(payload) if !payload.is_empty() => payload,
            Some(_) => {
                return Err(DirectoryError::inconsistent(name, "kubeconfig in secret is empty"))
            }
            None => {
                error!("Kubeconfig not found in secret {}", name);
                return Err(DirectoryError::inconsistent(
                    name,
                    format!("missing data key `{}`", KUBECONFIG_DATA_KEY),
                ));
            }
        };

        let path = self.cache().put(&self.environment.id, cluster_id, payload)?;
        info!("Kubeconfig saved successfully");
        Ok(path)
    }

    fn resolve_management(&self) -> Result<PathBuf> {
        let env = self.environment;
        if env.is_local_default() {
            let path = &env.management_kubeconfig;
            let len = fs::metadata(path).with_path("inspect", path)?.len();
            if len == 0 {
                return Err(DirectoryError::inconsistent(
                    path.display().to_string(),
                    "local kubeconfig is empty",
                ));
            }
            return Ok(path.clone());
        }

        info!("Downloading kubeconfig for management cluster ({})", MANAGEMENT_CLUSTER_ID);
        let target = SshTarget::for_environment(env);
        let contents = self
            .registry
            .bootstrap()
            .download_file(&target, REMOTE_KUBECONFIG)?;
        if contents.is_empty() {
            return Err(DirectoryError::inconsistent(
                format!("{}:{}", target.label(), REMOTE_KUBECONFIG),
                "remote kubeconfig is empty",
            ));
        }
        let path = self.cache().put(&env.id, MANAGEMENT_CLUSTER_ID, &contents)?;
        info!("Kubeconfig downloaded successfully");
        Ok(path)
    }

    /// Stores `kubeconfig` as a discoverable secret and mirrors it locally.
    pub fn register_cluster(&self, cluster_id: &str, kubeconfig: &[u8]) -> Result<()> {
        info!("Adding new cluster: {}", cluster_id);
        if cluster_id == MANAGEMENT_CLUSTER_ID {
            error!("Cannot add management cluster ({})", MANAGEMENT_CLUSTER_ID);
            return Err(DirectoryError::protected(ResourceKind::Cluster, cluster_id));
        }
        validate_workload_id(cluster_id)?;
        KubeConfig::parse(kubeconfig)?;

        let api = self.management_api()?;
        let name = secret_name(cluster_id);
        if api.get_secret(CLUSTER_NAMESPACE, &name)?.is_some() {
            error!("Cluster {} already exists", cluster_id);
            return Err(DirectoryError::already_exists(ResourceKind::Cluster, cluster_id));
        }

        let secret = SecretObject {
            name,
            secret_type: KUBECONFIG_SECRET_TYPE.to_string(),
            labels: BTreeMap::from([(CLUSTER_NAME_LABEL.to_string(), cluster_id.to_string())]),
            data: BTreeMap::from([(KUBECONFIG_DATA_KEY.to_string(), kubeconfig.to_vec())]),
        };
        api.create_secret(CLUSTER_NAMESPACE, &secret)?;
        self.cache().put(&self.environment.id, cluster_id, kubeconfig)?;
        info!("Cluster added successfully");
        Ok(())
    }

    pub fn deregister_cluster(&self, cluster_id: &str) -> Result<()> {
        info!("Deleting cluster: {}", cluster_id);
        if cluster_id == MANAGEMENT_CLUSTER_ID {
            error!("Cannot delete management cluster ({})", MANAGEMENT_CLUSTER_ID);
            return Err(DirectoryError::protected(ResourceKind::Cluster, cluster_id));
        }
        validate_workload_id(cluster_id)?;

        let name = secret_name(cluster_id);
        let removed = self.management_api()?.delete_secret(CLUSTER_NAMESPACE, &name)?;
        // The secret is gone either way, so is any local copy.
        if let Err(e) = self.cache().delete(&self.environment.id, cluster_id) {
            warn!("Failed to delete local kubeconfig for {}: {}", cluster_id, e);
        }
        if !removed {
            error!("Secret {} not found", name);
            return Err(DirectoryError::not_found(ResourceKind::Secret, name));
        }
        info!("Cluster deleted successfully");
        Ok(())
    }

    /// Nodes of any cluster in the environment, `gaia` included.
    pub fn list_cluster_nodes(&self, cluster_id: &str) -> Result<Vec<NodeInfo>> {
        info!("Listing nodes for cluster: {}", cluster_id);
        let kubeconfig = self.resolve_kubeconfig(cluster_id)?;
        let nodes = self.connector.connect(&kubeconfig)?.list_nodes()?;
        info!("Found {} nodes for cluster {}", nodes.len(), cluster_id);
        Ok(nodes)
    }

    /// Cluster ids currently materialized in the local cache.
    pub fn cached_clusters(&self) -> Result<Vec<String>> {
        self.cache().entries(&self.environment.id)
    }
}
