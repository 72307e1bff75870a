// src/discovery/api.rs
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::types::NodeInfo;

/// A namespaced custom resource collection, addressed the way `kubectl` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRef {
    pub group: &'static str,
    pub version: &'static str,
    pub plural: &'static str,
}

impl ResourceRef {
    /// `<plural>.<version>.<group>`, unambiguous even when several groups share a plural.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.plural, self.version, self.group)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretObject {
    pub name: String,
    pub secret_type: String,
    pub labels: BTreeMap<String, String>,
    /// Decoded payload keyed by data key.
    pub data: BTreeMap<String, Vec<u8>>,
}

/// Kubernetes API access scoped to one kubeconfig.
pub trait ManagementApi {
    /// Raw items of a custom resource collection.
    fn list_objects(&self, resource: &ResourceRef, namespace: &str) -> Result<Vec<serde_json::Value>>;

    fn list_secrets(&self, namespace: &str, label_selector: &str) -> Result<Vec<SecretObject>>;

    fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<SecretObject>>;

    fn create_secret(&self, namespace: &str, secret: &SecretObject) -> Result<()>;

    /// Returns `false` when there was no such secret.
    fn delete_secret(&self, namespace: &str, name: &str) -> Result<bool>;

    fn list_nodes(&self) -> Result<Vec<NodeInfo>>;
}

/// Builds API clients for arbitrary kubeconfig files.
pub trait ApiConnector {
    type Api: ManagementApi;

    fn connect(&self, kubeconfig: &Path) -> Result<Self::Api>;
}
