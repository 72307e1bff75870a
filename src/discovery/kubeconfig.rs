// src/discovery/kubeconfig.rs
use serde::Deserialize;

use crate::error::{DirectoryError, Result};

/// The part of a kubeconfig checked before it is stored. Everything else is
/// left for `kubectl` to interpret.
#[derive(Debug, Deserialize)]
pub struct KubeConfig {
    #[serde(default)]
    clusters: Option<Vec<serde_yaml::Value>>,
}

impl KubeConfig {
    /// Parses kubeconfig bytes, requiring at least one cluster entry.
    pub fn parse(contents: &[u8]) -> Result<Self> {
        let config: KubeConfig = serde_yaml::from_slice(contents).map_err(|e| DirectoryError::Invalid {
            field: "kubeconfig",
            reason: e.to_string(),
        })?;
        if config.clusters.as_ref().map_or(true, Vec::is_empty) {
            return Err(DirectoryError::Invalid {
                field: "kubeconfig",
                reason: "no clusters listed in the kubeconfig".to_string(),
            });
        }
        Ok(config)
    }
}
