// src/discovery/kubectl.rs
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error};

use super::api::{ApiConnector, ManagementApi, ResourceRef, SecretObject};
use crate::error::{DirectoryError, ResourceKind, Result};
use crate::types::NodeInfo;

pub const KUBECTL_ENV: &str = "DEVCTL_KUBECTL";

#[derive(Deserialize)]
struct ObjectList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretManifest {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(rename = "type", default)]
    secret_type: String,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct NodeManifest {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    status: NodeStatus,
}

#[derive(Default, Deserialize)]
struct NodeStatus {
    #[serde(default)]
    addresses: Vec<NodeAddress>,
}

#[derive(Deserialize)]
struct NodeAddress {
    #[serde(rename = "type")]
    address_type: String,
    address: String,
}

fn decode_secret(manifest: SecretManifest) -> Result<SecretObject> {
    let mut data = BTreeMap::new();
    for (key, encoded) in manifest.data {
        let decoded = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| {
                DirectoryError::inconsistent(
                    manifest.metadata.name.clone(),
                    format!("data key `{}` is not valid base64: {}", key, e),
                )
            })?;
        data.insert(key, decoded);
    }
    Ok(SecretObject {
        name: manifest.metadata.name,
        secret_type: manifest.secret_type,
        labels: manifest.metadata.labels,
        data,
    })
}

fn encode_secret(namespace: &str, secret: &SecretObject) -> SecretManifest {
    SecretManifest {
        api_version: "v1".to_string(),
        kind: "Secret".to_string(),
        metadata: ObjectMeta {
            name: secret.name.clone(),
            namespace: Some(namespace.to_string()),
            labels: secret.labels.clone(),
        },
        secret_type: secret.secret_type.clone(),
        data: secret
            .data
            .iter()
            .map(|(k, v)| (k.clone(), general_purpose::STANDARD.encode(v)))
            .collect(),
    }
}

fn internal_addresses(nodes: Vec<NodeManifest>) -> Vec<NodeInfo> {
    nodes
        .into_iter()
        .filter_map(|node| {
            let ip = node
                .status
                .addresses
                .into_iter()
                .find(|a| a.address_type == "InternalIP")?
                .address;
            Some(NodeInfo {
                name: node.metadata.name,
                internal_ip: ip,
            })
        })
        .collect()
}

/// Drives the `kubectl` binary against a single kubeconfig.
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: String,
    kubeconfig: PathBuf,
}

impl Kubectl {
    pub fn new(binary: impl Into<String>, kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            kubeconfig: kubeconfig.into(),
        }
    }

    fn target(&self) -> String {
        format!("cluster at {}", self.kubeconfig.display())
    }

    fn run(&self, args: &[&str], stdin: Option<&[u8]>) -> std::result::Result<Vec<u8>, Failure> {
        debug!(
            "Running {} --kubeconfig {} {}",
            self.binary,
            self.kubeconfig.display(),
            args.join(" ")
        );

        let mut child = Command::new(&self.binary)
            .arg("--kubeconfig")
            .arg(&self.kubeconfig)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Failure(format!("failed to run {}: {}", self.binary, e)))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input)
                .map_err(|e| Failure(format!("failed to write to {}: {}", self.binary, e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Failure(format!("failed to wait for {}: {}", self.binary, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("{} {} failed: {}", self.binary, args.join(" "), stderr);
            return Err(Failure(stderr));
        }
        Ok(output.stdout)
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, args: &[&str]) -> Result<T> {
        let stdout = self.run(args, None).map_err(|f| f.into_error(self, None))?;
        serde_json::from_slice(&stdout).map_err(|e| {
            DirectoryError::inconsistent(self.target(), format!("unexpected kubectl output: {}", e))
        })
    }
}

/// stderr of a failed invocation.
struct Failure(String);

impl Failure {
    fn into_error(self, kubectl: &Kubectl, subject: Option<(ResourceKind, &str)>) -> DirectoryError {
        match subject {
            Some((kind, id)) if self.0.contains("(AlreadyExists)") => {
                DirectoryError::already_exists(kind, id)
            }
            Some((kind, id)) if self.0.contains("(NotFound)") => DirectoryError::not_found(kind, id),
            _ => DirectoryError::unreachable(kubectl.target(), self.0),
        }
    }
}

impl ManagementApi for Kubectl {
    fn list_objects(&self, resource: &ResourceRef, namespace: &str) -> Result<Vec<serde_json::Value>> {
        let list: ObjectList<serde_json::Value> =
            self.get_json(&["get", &resource.qualified_name(), "-n", namespace, "-o", "json"])?;
        Ok(list.items)
    }

    fn list_secrets(&self, namespace: &str, label_selector: &str) -> Result<Vec<SecretObject>> {
        let list: ObjectList<SecretManifest> = self.get_json(&[
            "get", "secrets", "-n", namespace, "-l", label_selector, "-o", "json",
        ])?;
        list.items.into_iter().map(decode_secret).collect()
    }

    fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<SecretObject>> {
        let stdout = self
            .run(
                &["get", "secret", name, "-n", namespace, "-o", "json", "--ignore-not-found"],
                None,
            )
            .map_err(|f| f.into_error(self, Some((ResourceKind::Secret, name))))?;
        if stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let manifest: SecretManifest = serde_json::from_slice(&stdout).map_err(|e| {
            DirectoryError::inconsistent(name, format!("unexpected kubectl output: {}", e))
        })?;
        decode_secret(manifest).map(Some)
    }

    fn create_secret(&self, namespace: &str, secret: &SecretObject) -> Result<()> {
        let manifest = serde_json::to_vec(&encode_secret(namespace, secret)).map_err(|e| {
            DirectoryError::inconsistent(secret.name.clone(), format!("failed to encode secret: {}", e))
        })?;
        self.run(&["create", "-n", namespace, "-f", "-"], Some(&manifest))
            .map_err(|f| f.into_error(self, Some((ResourceKind::Secret, &secret.name))))?;
        Ok(())
    }

    fn delete_secret(&self, namespace: &str, name: &str) -> Result<bool> {
        let stdout = self
            .run(
                &["delete", "secret", name, "-n", namespace, "--ignore-not-found"],
                None,
            )
            .map_err(|f| f.into_error(self, Some((ResourceKind::Secret, name))))?;
        // kubectl prints `secret "<name>" deleted` only when something was removed.
        Ok(!stdout.iter().all(u8::is_ascii_whitespace))
    }

    fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        let list: ObjectList<NodeManifest> = self.get_json(&["get", "nodes", "-o", "json"])?;
        Ok(internal_addresses(list.items))
    }
}

#[derive(Debug, Clone)]
pub struct KubectlConnector {
    binary: String,
}

impl KubectlConnector {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for KubectlConnector {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

impl ApiConnector for KubectlConnector {
    type Api = Kubectl;

    fn connect(&self, kubeconfig: &Path) -> Result<Kubectl> {
        if !kubeconfig.is_file() {
            return Err(DirectoryError::not_found(
                ResourceKind::Document,
                kubeconfig.display().to_string(),
            ));
        }
        Ok(Kubectl::new(self.binary.clone(), kubeconfig))
    }
}
