//! SSH transport on top of russh and russh-sftp.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use russh::ChannelMsg;
use russh::client::{AuthResult, Config, Handle, Handler};
use russh::keys::PrivateKeyWithHashAlg;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::AsyncWriteExt;

use crate::conn::ConnectionDescriptor;
use crate::error::ConnectError;

use super::{Authenticator, CommandOutput, Connector, RemoteSession, script_command};

/// Client handler that accepts any server key.
// TODO: verify host keys against a known_hosts file
#[derive(Clone, Debug, Default)]
struct ClientHandler;

impl Handler for ClientHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// [`Connector`] that opens real SSH sessions.
#[derive(Clone)]
pub struct SshConnector {
    config: Arc<Config>,
}

impl SshConnector {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        auth: Authenticator,
    ) -> Result<Box<dyn RemoteSession>, ConnectError> {
        let target = descriptor.identity();
        let session_error = |source: anyhow::Error| ConnectError::Session {
            target: target.clone(),
            source: source.into(),
        };

        let mut handle = russh::client::connect(
            self.config.clone(),
            (descriptor.host(), descriptor.port()),
            ClientHandler,
        )
        .await
        .context("SSH connect failed")
        .map_err(session_error)?;

        tracing::debug!(
            host = %target,
            method = auth.method_name(),
            "connection established, authenticating"
        );

        let result = match auth {
            Authenticator::Password(password) => handle
                .authenticate_password(descriptor.user(), password)
                .await
                .context("password authentication"),
            Authenticator::PublicKey(key) => {
                let hash = handle
                    .best_supported_rsa_hash()
                    .await
                    .context("negotiate RSA hash")
                    .map_err(session_error)?
                    .flatten();
                handle
                    .authenticate_publickey(descriptor.user(), PrivateKeyWithHashAlg::new(key, hash))
                    .await
                    .context("public key authentication")
            }
        }
        .map_err(session_error)?;

        if let AuthResult::Failure { .. } = result {
            disconnect(&handle).await;
            return Err(ConnectError::AuthRejected(target.clone()));
        }

        let sftp = match open_sftp(&handle).await {
            Ok(sftp) => sftp,
            Err(e) => {
                disconnect(&handle).await;
                return Err(session_error(e));
            }
        };

        Ok(Box::new(SshSession {
            handle,
            sftp,
            target,
        }))
    }
}

async fn open_sftp(handle: &Handle<ClientHandler>) -> anyhow::Result<SftpSession> {
    let channel = handle
        .channel_open_session()
        .await
        .context("open SFTP channel")?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .context("request SFTP subsystem")?;
    let sftp = SftpSession::new(channel.into_stream())
        .await
        .context("start SFTP session")?;
    Ok(sftp)
}

async fn disconnect(handle: &Handle<ClientHandler>) {
    if let Err(e) = handle
        .disconnect(russh::Disconnect::ByApplication, "", "en")
        .await
    {
        tracing::debug!(error = %e, "disconnect failed");
    }
}

/// Authenticated SSH connection with an open SFTP subsystem.
struct SshSession {
    handle: Handle<ClientHandler>,
    sftp: SftpSession,
    target: String,
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn upload(&mut self, content: &[u8], remote_path: &str) -> anyhow::Result<()> {
        let flags = OpenFlags::WRITE
            .union(OpenFlags::CREATE)
            .union(OpenFlags::TRUNCATE);
        let mut file = self
            .sftp
            .open_with_flags(remote_path, flags)
            .await
            .with_context(|| format!("open remote file {} on {}", remote_path, self.target))?;
        file.write_all(content)
            .await
            .with_context(|| format!("write remote file {} on {}", remote_path, self.target))?;
        file.flush()
            .await
            .with_context(|| format!("flush remote file {} on {}", remote_path, self.target))?;
        file.shutdown()
            .await
            .with_context(|| format!("close remote file {} on {}", remote_path, self.target))?;
        Ok(())
    }

    async fn run_script(
        &mut self,
        remote_path: &str,
        elevate: bool,
    ) -> anyhow::Result<CommandOutput> {
        let command = script_command(remote_path, elevate);
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .context("open exec channel")?;
        tracing::debug!(host = %self.target, command = %command, "executing");
        channel
            .exec(true, command.as_str())
            .await
            .context("exec request")?;

        let mut output = CommandOutput::default();
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => output.output.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, .. } => {
                    output.output.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status } => output.exit_status = Some(exit_status),
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        if let Err(e) = channel.close().await {
            tracing::debug!(error = %e, "exec channel close failed");
        }
        Ok(output)
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        let sftp_result = self.sftp.close().await;
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| anyhow!("disconnect from {}: {}", self.target, e))?;
        sftp_result.with_context(|| format!("close SFTP session on {}", self.target))?;
        Ok(())
    }
}
