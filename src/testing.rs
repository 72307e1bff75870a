//! In-memory stand-ins for the bastion host and the management cluster.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::Paths;
use crate::discovery::{ApiConnector, ManagementApi, RemoteBootstrap, ResourceRef, SecretObject, SshTarget};
use crate::error::{DirectoryError, ResourceKind, Result};
use crate::types::{Environment, NodeInfo};

pub const SAMPLE_KUBECONFIG: &str = "\
apiVersion: v1
kind: Config
clusters:
- name: wk-7
  cluster:
    server: https://10.0.0.7:6443
contexts:
- name: admin@wk-7
  context:
    cluster: wk-7
    user: admin
current-context: admin@wk-7
users:
- name: admin
  user:
    token: abc
";

pub fn temp_paths() -> (tempfile::TempDir, Paths) {
    let dir = tempfile::tempdir().unwrap();
    let paths = Paths::new(dir.path().join(".devctl"));
    (dir, paths)
}

pub fn candidate(id: &str, host: &str) -> Environment {
    Environment::new(id, format!("{} site", id), host, "root", "pw")
}

#[derive(Default)]
struct RemoteState {
    reachable: Cell<bool>,
    contents: RefCell<Vec<u8>>,
    probes: Cell<usize>,
    downloads: Cell<usize>,
}

/// Bastion host whose reachability and served kubeconfig tests can change.
#[derive(Clone)]
pub struct FakeBootstrap {
    state: Rc<RemoteState>,
}

impl FakeBootstrap {
    pub fn reachable(contents: &str) -> Self {
        let fake = Self {
            state: Rc::new(RemoteState::default()),
        };
        fake.state.reachable.set(true);
        fake.serve(contents);
        fake
    }

    pub fn unreachable() -> Self {
        Self {
            state: Rc::new(RemoteState::default()),
        }
    }

    pub fn serve(&self, contents: &str) {
        *self.state.contents.borrow_mut() = contents.as_bytes().to_vec();
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.reachable.set(reachable);
    }

    pub fn probes(&self) -> usize {
        self.state.probes.get()
    }

    pub fn downloads(&self) -> usize {
        self.state.downloads.get()
    }
}

impl RemoteBootstrap for FakeBootstrap {
    fn test_connection(&self, target: &SshTarget) -> Result<()> {
        self.state.probes.set(self.state.probes.get() + 1);
        if self.state.reachable.get() {
            Ok(())
        } else {
            Err(DirectoryError::unreachable(target.label(), "connection refused"))
        }
    }

    fn download_file(&self, target: &SshTarget, _remote_path: &str) -> Result<Vec<u8>> {
        self.test_connection(target)?;
        self.state.downloads.set(self.state.downloads.get() + 1);
        Ok(self.state.contents.borrow().clone())
    }
}

#[derive(Default)]
pub struct ClusterState {
    pub objects: Vec<serde_json::Value>,
    pub secrets: BTreeMap<String, SecretObject>,
    pub nodes: Vec<NodeInfo>,
    pub connected: Vec<PathBuf>,
}

/// Management cluster shared by every client the connector hands out.
#[derive(Clone, Default)]
pub struct FakeConnector {
    pub state: Rc<RefCell<ClusterState>>,
}

impl FakeConnector {
    pub fn insert_secret(&self, secret: SecretObject) {
        self.state
            .borrow_mut()
            .secrets
            .insert(secret.name.clone(), secret);
    }

    pub fn has_secret(&self, name: &str) -> bool {
        self.state.borrow().secrets.contains_key(name)
    }
}

pub struct FakeApi {
    state: Rc<RefCell<ClusterState>>,
}

impl ApiConnector for FakeConnector {
    type Api = FakeApi;

    fn connect(&self, kubeconfig: &Path) -> Result<FakeApi> {
        self.state.borrow_mut().connected.push(kubeconfig.to_path_buf());
        Ok(FakeApi {
            state: Rc::clone(&self.state),
        })
    }
}

impl ManagementApi for FakeApi {
    fn list_objects(&self, _resource: &ResourceRef, _namespace: &str) -> Result<Vec<serde_json::Value>> {
        Ok(self.state.borrow().objects.clone())
    }

    fn list_secrets(&self, _namespace: &str, label_selector: &str) -> Result<Vec<SecretObject>> {
        Ok(self
            .state
            .borrow()
            .secrets
            .values()
            .filter(|s| s.labels.contains_key(label_selector))
            .cloned()
            .collect())
    }

    fn get_secret(&self, _namespace: &str, name: &str) -> Result<Option<SecretObject>> {
        Ok(self.state.borrow().secrets.get(name).cloned())
    }

    fn create_secret(&self, _namespace: &str, secret: &SecretObject) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.secrets.contains_key(&secret.name) {
            return Err(DirectoryError::already_exists(ResourceKind::Secret, secret.name.clone()));
        }
        state.secrets.insert(secret.name.clone(), secret.clone());
        Ok(())
    }

    fn delete_secret(&self, _namespace: &str, name: &str) -> Result<bool> {
        Ok(self.state.borrow_mut().secrets.remove(name).is_some())
    }

    fn list_nodes(&self) -> Result<Vec<NodeInfo>> {
        Ok(self.state.borrow().nodes.clone())
    }
}
