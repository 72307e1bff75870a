// config/store.rs
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, error, info};

use super::Paths;
use crate::error::{DirectoryError, IoContext, ResourceKind, Result};
use crate::types::Environment;
use crate::utils::fs::{create_private_dir, write_atomic};

const BACKUP_TIMESTAMP: &str = "%Y%m%d_%H%M%S_%3f";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub envs: Vec<Environment>,
}

/// Reads and writes the registry document. Every save snapshots the previous
/// document into the backup directory before replacing it.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
    backup_dir: PathBuf,
}

impl RegistryStore {
    pub fn new(paths: &Paths) -> Self {
        Self {
            path: paths.registry_document(),
            backup_dir: paths.backup_dir(),
        }
    }

    pub fn load(&self) -> Result<RegistryDocument> {
        info!("Loading registry from: {}", self.path.display());
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DirectoryError::not_found(
                    ResourceKind::Document,
                    self.path.display().to_string(),
                ))
            }
            Err(e) => return Err(e).with_path("read", &self.path),
        };

        if data.trim().is_empty() {
            return Ok(RegistryDocument::default());
        }
        serde_yaml::from_str(&data).map_err(|source| {
            error!("Failed to parse registry {}: {}", self.path.display(), source);
            DirectoryError::Document {
                path: self.path.clone(),
                source,
            }
        })
    }

    /// Loads the document, treating a missing file as an empty registry.
    pub fn load_or_default(&self) -> Result<RegistryDocument> {
        match self.load() {
            Err(DirectoryError::NotFound { .. }) => {
                info!("Registry document doesn't exist yet, starting empty");
                Ok(RegistryDocument::default())
            }
            other => other,
        }
    }

    pub fn save(&self, document: &RegistryDocument) -> Result<()> {
        info!("Saving registry to: {}", self.path.display());
        let data = serde_yaml::to_string(document).map_err(|source| DirectoryError::Document {
            path: self.path.clone(),
            source,
        })?;

        if let Err(e) = self.backup() {
            error!("Failed to backup registry: {}", e);
            return Err(e);
        }
        write_atomic(&self.path, data.as_bytes())?;
        info!("Registry saved successfully");
        Ok(())
    }

    /// Copies the current document to a timestamped file. Returns `None` when
    /// there is nothing to back up yet.
    pub fn backup(&self) -> Result<Option<PathBuf>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Registry document doesn't exist, no need to backup");
                return Ok(None);
            }
            Err(e) => return Err(e).with_path("read", &self.path),
        };

        create_private_dir(&self.backup_dir)?;
        let stamp = Local::now().format(BACKUP_TIMESTAMP);
        let mut backup = self.backup_dir.join(format!("config_{}.yaml", stamp));
        if backup.exists() {
            backup = self.backup_dir.join(format!(
                "config_{}_{}.yaml",
                stamp,
                uuid::Uuid::new_v4().simple()
            ));
        }

        write_atomic(&backup, &data)?;
        info!("Registry backup created: {}", backup.display());
        Ok(Some(backup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Environment;

    fn store() -> (tempfile::TempDir, RegistryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::new(&Paths::new(dir.path()));
        (dir, store)
    }

    fn backups(store: &RegistryStore) -> Vec<PathBuf> {
        match fs::read_dir(&store.backup_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn missing_document_is_not_found_but_loads_empty() {
        let (_dir, store) = store();
        assert!(matches!(
            store.load(),
            Err(DirectoryError::NotFound { kind: ResourceKind::Document, .. })
        ));
        assert!(store.load_or_default().unwrap().envs.is_empty());
    }

    #[test]
    fn first_save_skips_backup_then_every_save_snapshots() {
        let (_dir, store) = store();
        let mut doc = RegistryDocument::default();
        doc.envs.push(Environment::new("a", "A", "10.0.0.1", "root", "pw"));

        store.save(&doc).unwrap();
        assert!(backups(&store).is_empty());

        doc.envs.push(Environment::new("b", "B", "10.0.0.2", "root", "pw"));
        store.save(&doc).unwrap();
        store.save(&doc).unwrap();

        let saved = backups(&store);
        assert_eq!(saved.len(), 2);
        let contents: Vec<RegistryDocument> = saved
            .iter()
            .map(|p| serde_yaml::from_str(&fs::read_to_string(p).unwrap()).unwrap())
            .collect();
        assert!(contents.iter().any(|d| d.envs.len() == 1));

        let loaded = store.load().unwrap();
        let ids: Vec<_> = loaded.envs.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn malformed_document_is_reported() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path.parent().unwrap()).unwrap();
        fs::write(&store.path, "envs: [ { id: ").unwrap();
        assert!(matches!(store.load(), Err(DirectoryError::Document { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn failed_backup_aborts_save_and_keeps_document() {
        let (dir, store) = store();
        let mut doc = RegistryDocument::default();
        doc.envs.push(Environment::new("a", "A", "10.0.0.1", "root", "pw"));
        store.save(&doc).unwrap();

        // A regular file where the backup directory should be makes the backup fail.
        fs::write(dir.path().join("backups"), "not a directory").unwrap();

        doc.envs.clear();
        assert!(store.save(&doc).is_err());
        assert_eq!(store.load().unwrap().envs.len(), 1);
    }
}
