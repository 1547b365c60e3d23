//! Authenticator construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use russh::keys::{PrivateKey, decode_secret_key};

use crate::conn::ConnectionDescriptor;
use crate::error::ConnectError;

use super::Authenticator;

/// Private key settings shared by every host of a run.
#[derive(Clone, Default)]
pub struct KeyConfig {
    /// Path to the private key file
    pub path: Option<PathBuf>,
    /// Passphrase for an encrypted key
    pub passphrase: Option<String>,
}

impl KeyConfig {
    pub fn new(path: Option<PathBuf>, passphrase: Option<String>) -> Self {
        Self { path, passphrase }
    }
}

impl std::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyConfig")
            .field("path", &self.path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Pick the authentication method for one host.
///
/// A password in the descriptor wins. Otherwise the private key is read from
/// `key.path` and decoded, using the passphrase only when the key turns out
/// to be encrypted.
pub async fn build_authenticator(
    descriptor: &ConnectionDescriptor,
    key: &KeyConfig,
) -> Result<Authenticator, ConnectError> {
    if let Some(password) = descriptor.password() {
        return Ok(Authenticator::Password(password.to_string()));
    }

    let path = key.path.as_deref().ok_or(ConnectError::NoCredentials)?;
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConnectError::KeyRead {
            path: path.to_path_buf(),
            source,
        })?;
    let private_key = decode_key(path, &text, key.passphrase.as_deref())?;

    Ok(Authenticator::PublicKey(Arc::new(private_key)))
}

fn decode_key(
    path: &Path,
    text: &str,
    passphrase: Option<&str>,
) -> Result<PrivateKey, ConnectError> {
    let decode_error = |source: russh::keys::Error| ConnectError::KeyDecode {
        path: path.to_path_buf(),
        source: source.into(),
    };

    match decode_secret_key(text, None) {
        Ok(key) => Ok(key),
        Err(russh::keys::Error::KeyIsEncrypted) => {
            let passphrase = passphrase
                .filter(|p| !p.is_empty())
                .ok_or_else(|| ConnectError::PassphraseMissing(path.to_path_buf()))?;
            decode_secret_key(text, Some(passphrase)).map_err(decode_error)
        }
        Err(e) => Err(decode_error(e)),
    }
}
