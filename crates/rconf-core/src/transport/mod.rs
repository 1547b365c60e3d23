//! Remote transport.
//!
//! The host pipeline talks to remote machines only through [`Connector`] and
//! [`RemoteSession`]. The SSH implementation lives in [`ssh`]; tests plug in
//! in-memory fakes.

pub mod auth;
pub mod ssh;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::conn::ConnectionDescriptor;
use crate::error::ConnectError;

pub use auth::{KeyConfig, build_authenticator};
pub use ssh::SshConnector;

/// How a session authenticates.
#[derive(Clone)]
pub enum Authenticator {
    /// Password taken from the connection string
    Password(String),
    /// Decoded private key
    PublicKey(Arc<russh::keys::PrivateKey>),
}

impl Authenticator {
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::PublicKey(_) => "publickey",
        }
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Authenticator::{}", self.method_name())
    }
}

/// Combined stdout/stderr and exit status of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `None` when the channel closed without reporting one
    pub exit_status: Option<u32>,
    /// Interleaved stdout and stderr bytes
    pub output: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }

    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Opens authenticated sessions to remote hosts.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        auth: Authenticator,
    ) -> Result<Box<dyn RemoteSession>, ConnectError>;
}

/// An open session with one host.
#[async_trait]
pub trait RemoteSession: Send {
    /// Write `content` to `remote_path`, replacing any existing file.
    async fn upload(&mut self, content: &[u8], remote_path: &str) -> anyhow::Result<()>;

    /// Mark `remote_path` executable and run it, optionally under `sudo`.
    async fn run_script(&mut self, remote_path: &str, elevate: bool)
    -> anyhow::Result<CommandOutput>;

    /// Tear the session down.
    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}

/// Shell command that makes `remote_path` executable and runs it.
pub fn script_command(remote_path: &str, elevate: bool) -> String {
    let path = sh_escape(remote_path);
    if elevate {
        format!("sudo chmod +x {path} && sudo {path}")
    } else {
        format!("chmod +x {path} && {path}")
    }
}

/// Single-quote `s` for a POSIX shell.
pub fn sh_escape(s: &str) -> String {
    let mut out = String::from("'");
    out.push_str(&s.replace('\'', r"'\''"));
    out.push('\'');
    out
}
