// src/cache/credentials.rs
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{IoContext, Result};
use crate::types::{validate_id, MANAGEMENT_CLUSTER_ID};
use crate::utils::fs::{remove_dir_if_present, remove_file_if_present, write_atomic};

/// File name of the management cluster's kubeconfig inside an environment directory.
pub const MANAGEMENT_FILE: &str = "config";

/// Filesystem mirror of kubeconfig bytes keyed by (environment, cluster).
/// Never authoritative: every entry can be regenerated from its source.
#[derive(Debug, Clone)]
pub struct CredentialCache {
    root: PathBuf,
}

impl CredentialCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn environment_dir(&self, env_id: &str) -> PathBuf {
        self.root.join(env_id)
    }

    pub fn path(&self, env_id: &str, cluster_id: &str) -> PathBuf {
        let file = if cluster_id == MANAGEMENT_CLUSTER_ID {
            MANAGEMENT_FILE
        } else {
            cluster_id
        };
        self.environment_dir(env_id).join(file)
    }

    fn checked_path(&self, env_id: &str, cluster_id: &str) -> Result<PathBuf> {
        validate_id("environment id", env_id)?;
        validate_id("cluster id", cluster_id)?;
        Ok(self.path(env_id, cluster_id))
    }

    pub fn put(&self, env_id: &str, cluster_id: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.checked_path(env_id, cluster_id)?;
        write_atomic(&path, contents)?;
        debug!("Cached {} bytes for {}/{} at {}", contents.len(), env_id, cluster_id, path.display());
        Ok(path)
    }

    #[cfg(test)]
    pub fn get(&self, env_id: &str, cluster_id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.checked_path(env_id, cluster_id)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_path("read", &path),
        }
    }

    pub fn delete(&self, env_id: &str, cluster_id: &str) -> Result<()> {
        let path = self.checked_path(env_id, cluster_id)?;
        if remove_file_if_present(&path)? {
            info!("Removed cached kubeconfig {}", path.display());
        }
        Ok(())
    }

    pub fn delete_all(&self, env_id: &str) -> Result<()> {
        validate_id("environment id", env_id)?;
        let dir = self.environment_dir(env_id);
        if remove_dir_if_present(&dir)? {
            info!("Removed kubeconfig directory {}", dir.display());
        }
        Ok(())
    }

    /// Cluster ids with a materialized entry for `env_id`, management cluster first.
    pub fn entries(&self, env_id: &str) -> Result<Vec<String>> {
        validate_id("environment id", env_id)?;
        let dir = self.environment_dir(env_id);
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_path("list", &dir),
        };

        let mut ids = Vec::new();
        let mut has_management = false;
        for entry in listing {
            let entry = entry.with_path("list", &dir)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.path().is_file() {
                continue;
            }
            if name == MANAGEMENT_FILE {
                has_management = true;
            } else {
                ids.push(name);
            }
        }
        ids.sort();
        if has_management {
            ids.insert(0, MANAGEMENT_CLUSTER_ID.to_string());
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn cache() -> (tempfile::TempDir, CredentialCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = CredentialCache::new(dir.path().join("kubeconfigs"));
        (dir, cache)
    }

    #[test]
    fn management_cluster_maps_to_config_file() {
        let cache = CredentialCache::new("/c");
        assert_eq!(cache.path("prod-1", "gaia"), Path::new("/c/prod-1/config"));
        assert_eq!(cache.path("prod-1", "wk-7"), Path::new("/c/prod-1/wk-7"));
    }

    #[test]
    fn put_overwrites_and_get_reads_back() {
        let (_dir, cache) = cache();
        let path = cache.put("prod-1", "wk-7", b"old").unwrap();
        cache.put("prod-1", "wk-7", b"new").unwrap();
        assert_eq!(fs::read(path).unwrap(), b"new");
        assert_eq!(cache.get("prod-1", "wk-7").unwrap().as_deref(), Some(&b"new"[..]));
        assert_eq!(cache.get("prod-1", "missing").unwrap(), None);
    }

    #[test]
    fn deletes_tolerate_absent_entries() {
        let (_dir, cache) = cache();
        cache.delete("prod-1", "wk-7").unwrap();
        cache.delete_all("prod-1").unwrap();

        cache.put("prod-1", "gaia", b"x").unwrap();
        cache.put("prod-1", "wk-7", b"y").unwrap();
        cache.delete("prod-1", "wk-7").unwrap();
        assert_eq!(cache.entries("prod-1").unwrap(), ["gaia"]);

        cache.delete_all("prod-1").unwrap();
        assert!(!cache.environment_dir("prod-1").exists());
    }

    #[test]
    fn entries_list_management_first() {
        let (_dir, cache) = cache();
        cache.put("e", "zeta", b"1").unwrap();
        cache.put("e", "alpha", b"1").unwrap();
        cache.put("e", "gaia", b"1").unwrap();
        assert_eq!(cache.entries("e").unwrap(), ["gaia", "alpha", "zeta"]);
    }

    #[test]
    fn rejects_keys_that_escape_the_root() {
        let (_dir, cache) = cache();
        assert!(cache.put("..", "x", b"1").is_err());
        assert!(cache.put("e", "../x", b"1").is_err());
        assert!(cache.delete_all("a/b").is_err());
    }
}
