// src/discovery/ssh.rs

use ssh2::Session;
use std::io::Read;
use std::net::TcpStream;
use std::path::Path;
use tracing::{debug, error, info};

use crate::error::{DirectoryError, Result};
use crate::types::Environment;

pub const SSH_PORT: u16 = 22;
/// Where the management cluster's admin kubeconfig lives on a bastion host.
pub const REMOTE_KUBECONFIG: &str = "/root/.kube/config";

#[derive(Clone)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: u16,
}

impl SshTarget {
    pub fn for_environment(env: &Environment) -> Self {
        Self {
            host: env.host.clone(),
            user: env.ssh_user.clone(),
            password: env.ssh_password.clone(),
            port: SSH_PORT,
        }
    }

    pub fn label(&self) -> String {
        if self.port == SSH_PORT {
            format!("{}@{}", self.user, self.host)
        } else {
            format!("{}@{}:{}", self.user, self.host, self.port)
        }
    }
}

// Password stays out of logs and panics.
impl std::fmt::Debug for SshTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTarget")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

/// Reaches a bastion host with password credentials.
pub trait RemoteBootstrap {
    /// Verifies the host answers and accepts the credentials.
    fn test_connection(&self, target: &SshTarget) -> Result<()>;

    /// Returns the contents of `remote_path` on the host.
    fn download_file(&self, target: &SshTarget, remote_path: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SshBootstrap;

impl SshBootstrap {
    pub fn new() -> Self {
        Self
    }

    fn connect(&self, target: &SshTarget) -> Result<Session> {
        debug!("Dialing {}", target.label());
        let tcp = TcpStream::connect((target.host.as_str(), target.port))
            .map_err(|e| failure(target, "failed to dial", e))?;

        let mut session = Session::new().map_err(|e| failure(target, "failed to open session", e))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| failure(target, "handshake failed", e))?;
        session
            .userauth_password(&target.user, &target.password)
            .map_err(|e| failure(target, "authentication failed", e))?;
        if !session.authenticated() {
            return Err(failure(target, "authentication failed", "credentials rejected"));
        }
        Ok(session)
    }
}

/// Upper bound on buffer space reserved from a size the remote side reports.
const MAX_PREALLOCATION: u64 = 1 << 20;

fn preallocation(reported: u64) -> usize {
    reported.min(MAX_PREALLOCATION) as usize
}

fn failure(target: &SshTarget, what: &str, cause: impl std::fmt::Display) -> DirectoryError {
    DirectoryError::unreachable(target.label(), format!("{}: {}", what, cause))
}

impl RemoteBootstrap for SshBootstrap {
    fn test_connection(&self, target: &SshTarget) -> Result<()> {
        info!("Testing SSH connection to {}", target.label());
        let session = self.connect(target)?;
        let what = "failed to execute test command";

        let mut channel = session.channel_session().map_err(|e| failure(target, what, e))?;
        channel
            .exec("echo 'Connected successfully'")
            .map_err(|e| failure(target, what, e))?;
        let mut output = String::new();
        channel
            .read_to_string(&mut output)
            .map_err(|e| failure(target, what, e))?;
        channel.wait_close().map_err(|e| failure(target, what, e))?;

        let status = channel.exit_status().map_err(|e| failure(target, what, e))?;
        if status != 0 {
            error!("Test command on {} exited with {}", target.label(), status);
            return Err(failure(target, what, format!("exit status {}", status)));
        }
        info!("SSH connection to {} verified", target.label());
        Ok(())
    }

    fn download_file(&self, target: &SshTarget, remote_path: &str) -> Result<Vec<u8>> {
        info!("Downloading {} from {}", remote_path, target.label());
        let session = self.connect(target)?;
        let what = format!("failed to download {}", remote_path);

        let (mut channel, stat) = session
            .scp_recv(Path::new(remote_path))
            .map_err(|e| failure(target, &what, e))?;
        let mut contents = Vec::with_capacity(preallocation(stat.size()));
        channel
            .read_to_end(&mut contents)
            .map_err(|e| failure(target, &what, e))?;

        channel.send_eof().map_err(|e| failure(target, &what, e))?;
        channel.wait_eof().map_err(|e| failure(target, &what, e))?;
        channel.close().map_err(|e| failure(target, &what, e))?;
        channel.wait_close().map_err(|e| failure(target, &what, e))?;

        debug!("Downloaded {} bytes from {}", contents.len(), target.label());
        Ok(contents)
    }
}
