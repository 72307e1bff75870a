// config/paths.rs
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{DirectoryError, Result};

pub const HOME_ENV: &str = "DEVCTL_HOME";
const ROOT_DIR: &str = ".devctl";

/// Per-user locations of everything the tool keeps on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves the root from an explicit override, then `DEVCTL_HOME`, then `~/.devctl`.
    pub fn resolve(override_root: Option<&str>) -> Result<Self> {
        if let Some(root) = override_root.filter(|r| !r.is_empty()) {
            return Ok(Self::new(expand(root)));
        }
        if let Ok(root) = env::var(HOME_ENV) {
            if !root.is_empty() {
                return Ok(Self::new(expand(&root)));
            }
        }
        let home = dirs::home_dir().ok_or_else(|| DirectoryError::Invalid {
            field: "home directory",
            reason: "could not determine the current user's home directory".to_string(),
        })?;
        Ok(Self::new(home.join(ROOT_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry_document(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn cache_root(&self) -> PathBuf {
        self.root.join("kubeconfigs")
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("devctl.log")
    }
}

pub fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// The kubeconfig an already-configured local `kubectl` would use, if it exists.
pub fn ambient_kubeconfig() -> Option<PathBuf> {
    let from_env = env::var("KUBECONFIG")
        .ok()
        .and_then(|value| {
            env::split_paths(&value)
                .find(|p| !p.as_os_str().is_empty())
        })
        .map(|p| expand(&p.to_string_lossy()));

    let candidate = match from_env {
        Some(path) => path,
        None => dirs::home_dir()?.join(".kube").join("config"),
    };
    candidate.is_file().then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_lives_under_the_root() {
        let paths = Paths::new("/home/op/.devctl");
        assert_eq!(paths.registry_document(), Path::new("/home/op/.devctl/config.yaml"));
        assert_eq!(paths.backup_dir(), Path::new("/home/op/.devctl/backups"));
        assert_eq!(paths.cache_root(), Path::new("/home/op/.devctl/kubeconfigs"));
        assert_eq!(paths.log_file(), Path::new("/home/op/.devctl/devctl.log"));
    }

    #[test]
    fn explicit_override_wins() {
        let paths = Paths::resolve(Some("/srv/devctl")).unwrap();
        assert_eq!(paths.root(), Path::new("/srv/devctl"));
    }
}
