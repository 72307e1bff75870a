mod api;
mod kubeconfig;
mod kubectl;
mod ssh;

pub use api::{ApiConnector, ManagementApi, ResourceRef, SecretObject};
pub use kubeconfig::KubeConfig;
pub use kubectl::{KubectlConnector, KUBECTL_ENV};
pub use ssh::{RemoteBootstrap, SshBootstrap, SshTarget, REMOTE_KUBECONFIG};
