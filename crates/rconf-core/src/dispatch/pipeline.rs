//! Work done for a single host.

use std::sync::Arc;

use tracing::Instrument;

use crate::conn::ConnectionDescriptor;
use crate::error::ScriptError;
use crate::source::{ScriptRef, ScriptSet};
use crate::transport::{
    CommandOutput, Connector, KeyConfig, RemoteSession, build_authenticator,
};

use super::report::HostOutcome;

/// Remote location a script is uploaded to.
pub fn remote_path(staging_dir: &str, script: &ScriptRef) -> String {
    format!(
        "{}/{}",
        staging_dir.trim_end_matches('/'),
        script.base_name()
    )
}

/// Everything one worker needs to process one host.
pub struct HostTask {
    pub(crate) descriptor: ConnectionDescriptor,
    pub(crate) scripts: Arc<ScriptSet>,
    pub(crate) key: Arc<KeyConfig>,
    pub(crate) staging_dir: Arc<str>,
    pub(crate) connector: Arc<dyn Connector>,
}

impl HostTask {
    pub fn identity(&self) -> String {
        self.descriptor.identity()
    }

    /// Connect, run every script, disconnect.
    pub async fn run(self) -> HostOutcome {
        let span = tracing::info_span!("host", host = %self.descriptor.identity());
        self.execute().instrument(span).await
    }

    async fn execute(&self) -> HostOutcome {
        let auth = match build_authenticator(&self.descriptor, &self.key).await {
            Ok(auth) => auth,
            Err(e) => {
                tracing::error!(error = %e, "cannot connect");
                return HostOutcome::ConnectionFailed;
            }
        };

        let mut session = match self.connector.connect(&self.descriptor, auth).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "cannot connect");
                return HostOutcome::ConnectionFailed;
            }
        };
        tracing::info!("connected");

        let elevate = self.descriptor.elevate();
        let mut failed = Vec::new();
        for (script, content) in self.scripts.iter() {
            let target = remote_path(&self.staging_dir, script);
            match run_one(session.as_mut(), content, &target, elevate).await {
                Ok(output) => {
                    tracing::info!(
                        script = %script,
                        output = %output.output_lossy(),
                        "script executed"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        script = %script,
                        error = %e,
                        output = script_output(&e),
                        "script failed"
                    );
                    failed.push(script.clone());
                }
            }
        }

        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "disconnect failed");
        }

        if failed.is_empty() {
            HostOutcome::Success
        } else {
            failed.sort();
            HostOutcome::Failed(failed)
        }
    }
}

async fn run_one(
    session: &mut dyn RemoteSession,
    content: &[u8],
    remote_path: &str,
    elevate: bool,
) -> Result<CommandOutput, ScriptError> {
    session
        .upload(content, remote_path)
        .await
        .map_err(|source| ScriptError::Upload {
            remote_path: remote_path.to_string(),
            source: source.into(),
        })?;

    let output = session
        .run_script(remote_path, elevate)
        .await
        .map_err(|source| ScriptError::Exec {
            remote_path: remote_path.to_string(),
            source: source.into(),
        })?;

    match output.exit_status {
        Some(0) => Ok(output),
        Some(status) => Err(ScriptError::NonZeroExit {
            remote_path: remote_path.to_string(),
            status,
            output: output.output_lossy(),
        }),
        None => Err(ScriptError::NoExitStatus {
            remote_path: remote_path.to_string(),
            output: output.output_lossy(),
        }),
    }
}

fn script_output(error: &ScriptError) -> &str {
    match error {
        ScriptError::NonZeroExit { output, .. } | ScriptError::NoExitStatus { output, .. } => {
            output
        }
        _ => "",
    }
}
