// src/error.rs
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Environment,
    Cluster,
    Secret,
    Document,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Environment => "environment",
            Self::Cluster => "cluster",
            Self::Secret => "secret",
            Self::Document => "document",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("{kind} `{id}` already exists")]
    AlreadyExists { kind: ResourceKind, id: String },

    #[error("{kind} `{id}` is protected and cannot be modified")]
    Protected { kind: ResourceKind, id: String },

    #[error("{target} is unreachable: {reason}")]
    Unreachable { target: String, reason: String },

    #[error("{id} is inconsistent: {reason}")]
    Inconsistent { id: String, reason: String },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed document {}: {source}", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

pub type Result<T, E = DirectoryError> = std::result::Result<T, E>;

impl DirectoryError {
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn already_exists(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    pub fn protected(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::Protected {
            kind,
            id: id.into(),
        }
    }

    pub fn unreachable(target: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Unreachable {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn inconsistent(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Inconsistent {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Attaches an action and a path to a bare `io::Result`.
pub trait IoContext<T> {
    fn with_path(self, action: &'static str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn with_path(self, action: &'static str, path: &Path) -> Result<T> {
        self.map_err(|e| DirectoryError::io(action, path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_resource() {
        let err = DirectoryError::not_found(ResourceKind::Environment, "prod-1");
        assert_eq!(err.to_string(), "environment `prod-1` not found");

        let err = DirectoryError::protected(ResourceKind::Cluster, "gaia");
        assert_eq!(
            err.to_string(),
            "cluster `gaia` is protected and cannot be modified"
        );
    }

    #[test]
    fn io_context_keeps_the_path() {
        let res: io::Result<()> = Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        let err = res.with_path("write", Path::new("/tmp/x")).unwrap_err();
        assert!(matches!(err, DirectoryError::Io { action: "write", .. }));
        assert!(err.to_string().contains("/tmp/x"));
    }
}
