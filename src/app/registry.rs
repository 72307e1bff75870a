// src/app/registry.rs
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::cache::CredentialCache;
use crate::config::{Paths, RegistryDocument, RegistryStore};
use crate::discovery::{RemoteBootstrap, SshTarget, REMOTE_KUBECONFIG};
use crate::error::{DirectoryError, ResourceKind, Result};
use crate::types::{now, validate_id, Environment, DEFAULT_ENV_ID, MANAGEMENT_CLUSTER_ID};

/// Ordered set of environments backed by the registry document.
///
/// Every mutation is applied to a copy of the document and only becomes
/// visible once that copy has been persisted, so a failed save leaves both the
/// file and the in-memory view as they were.
pub struct EnvironmentRegistry<B> {
    store: RegistryStore,
    document: RegistryDocument,
    cache: CredentialCache,
    bootstrap: B,
    default_checked: bool,
}

impl<B: RemoteBootstrap> EnvironmentRegistry<B> {
    pub fn open(paths: &Paths, bootstrap: B) -> Result<Self> {
        let store = RegistryStore::new(paths);
        let document = store.load_or_default()?;
        info!("Loaded {} environments", document.envs.len());
        Ok(Self {
            store,
            document,
            cache: CredentialCache::new(paths.cache_root()),
            bootstrap,
            default_checked: false,
        })
    }

    pub fn list(&self) -> &[Environment] {
        &self.document.envs
    }

    pub fn get(&self, id: &str) -> Result<&Environment> {
        self.document
            .envs
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| DirectoryError::not_found(ResourceKind::Environment, id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.document.envs.iter().any(|e| e.id == id)
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    pub fn bootstrap(&self) -> &B {
        &self.bootstrap
    }

    /// Registers a remote environment. The bastion is probed before anything is
    /// written; on success its management kubeconfig lands in the cache.
    pub fn add(&mut self, mut candidate: Environment) -> Result<()> {
        info!("Adding new environment: {}", candidate.id);
        validate_id("environment id", &candidate.id)?;
        if candidate.id == DEFAULT_ENV_ID {
            error!("Environment id {} is reserved", DEFAULT_ENV_ID);
            return Err(DirectoryError::protected(ResourceKind::Environment, DEFAULT_ENV_ID));
        }
        if self.contains(&candidate.id) {
            error!("Environment with ID {} already exists", candidate.id);
            return Err(DirectoryError::already_exists(ResourceKind::Environment, candidate.id));
        }

        let target = SshTarget::for_environment(&candidate);
        if let Err(e) = self.bootstrap.test_connection(&target) {
            error!("Connection test for {} failed: {}", candidate.id, e);
            return Err(e);
        }

        let kubeconfig = self.bootstrap.download_file(&target, REMOTE_KUBECONFIG)?;
        if kubeconfig.is_empty() {
            return Err(DirectoryError::inconsistent(
                format!("{}:{}", target.label(), REMOTE_KUBECONFIG),
                "remote kubeconfig is empty",
            ));
        }
        let cached = match self.cache.put(&candidate.id, MANAGEMENT_CLUSTER_ID, &kubeconfig) {
            Ok(path) => path,
            Err(e) => {
                self.discard_cache(&candidate.id);
                return Err(e);
            }
        };
        info!("Kubeconfig downloaded successfully for environment {}", candidate.id);

        let stamp = now();
        candidate.management_kubeconfig = cached;
        candidate.created_at = stamp;
        candidate.updated_at = stamp;

        let id = candidate.id.clone();
        let mut next = self.document.clone();
        next.envs.push(candidate);
        if let Err(e) = self.commit(next) {
            error!("Failed to save registry after adding environment {}: {}", id, e);
            self.discard_cache(&id);
            return Err(e);
        }
        info!("Environment {} added successfully", id);
        Ok(())
    }

    /// Replaces an environment in place. Connectivity is not re-probed and the
    /// cached kubeconfig is left alone.
    pub fn update(&mut self, mut candidate: Environment) -> Result<()> {
        info!("Updating environment: {}", candidate.id);
        if candidate.id == DEFAULT_ENV_ID {
            return Err(DirectoryError::protected(ResourceKind::Environment, DEFAULT_ENV_ID));
        }
        let Some(index) = self.document.envs.iter().position(|e| e.id == candidate.id) else {
            error!("Environment with ID {} not found", candidate.id);
            return Err(DirectoryError::not_found(ResourceKind::Environment, candidate.id));
        };

        let existing = &self.document.envs[index];
        candidate.created_at = existing.created_at;
        if candidate.management_kubeconfig.as_os_str().is_empty() {
            candidate.management_kubeconfig = existing.management_kubeconfig.clone();
        }
        candidate.updated_at = now();

        let id = candidate.id.clone();
        let mut next = self.document.clone();
        next.envs[index] = candidate;
        self.commit(next)?;
        info!("Environment {} updated successfully", id);
        Ok(())
    }

    /// Removes an environment along with everything cached for it.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        info!("Deleting environment: {}", id);
        if id == DEFAULT_ENV_ID {
            error!("Refusing to delete the {} environment", DEFAULT_ENV_ID);
            return Err(DirectoryError::protected(ResourceKind::Environment, id));
        }
        let Some(index) = self.document.envs.iter().position(|e| e.id == id) else {
            error!("Environment with ID {} not found", id);
            return Err(DirectoryError::not_found(ResourceKind::Environment, id));
        };

        // Cache goes first: a missing cache entry is recoverable, a registry
        // entry whose cache was half removed is not.
        self.discard_cache(id);

        let mut next = self.document.clone();
        next.envs.remove(index);
        self.commit(next)?;
        info!("Environment {} deleted successfully", id);
        Ok(())
    }

    /// Adds the local `default` environment when an ambient kubeconfig exists.
    /// Checks at most once per registry and never replaces an existing entry.
    /// Returns whether an entry was created.
    pub fn ensure_local_default_bootstrapped<F>(&mut self, probe: F) -> Result<bool>
    where
        F: FnOnce() -> Option<PathBuf>,
    {
        if self.default_checked {
            return Ok(false);
        }
        self.default_checked = true;
        if self.contains(DEFAULT_ENV_ID) {
            return Ok(false);
        }
        let Some(kubeconfig) = probe() else {
            info!("No local kubeconfig found, skipping default environment");
            return Ok(false);
        };

        info!("Adding default environment for {}", kubeconfig.display());
        let mut next = self.document.clone();
        next.envs.insert(0, Environment::local_default(kubeconfig));
        self.commit(next)?;
        Ok(true)
    }

    fn commit(&mut self, next: RegistryDocument) -> Result<()> {
        self.store.save(&next)?;
        self.document = next;
        Ok(())
    }

    fn discard_cache(&self, id: &str) {
        if let Err(e) = self.cache.delete_all(id) {
            warn!("Failed to remove cached kubeconfigs for {}: {}", id, e);
        }
    }
}
