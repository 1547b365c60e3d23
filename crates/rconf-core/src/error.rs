//! Error taxonomy for a run.
//!
//! Only [`ConfigError`], [`ResolveError`] and [`LoadError`] stop a run; they
//! are raised before any connection is opened. [`ConnectError`] and
//! [`ScriptError`] are scoped to one host (or one script on one host) and end
//! up as a recorded outcome instead of propagating.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error from an adapter (SSH, HTTP) carried as a source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure to parse a single connection string.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty connection string")]
    Empty,

    #[error("invalid connection string: {0}")]
    Syntax(#[from] url::ParseError),

    #[error("user is required")]
    MissingUser,

    #[error("hostname is required")]
    MissingHost,
}

/// Invalid run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("connection string #{index}: {source}")]
    Connection {
        index: usize,
        #[source]
        source: ParseError,
    },

    #[error("duplicate connection target: {0}")]
    DuplicateHost(String),

    #[error("worker limit must be at least 1")]
    ZeroWorkers,

    #[error("at least one {0} is required")]
    Missing(&'static str),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failure to expand a script specification into script references.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("cannot access '{spec}': {source}")]
    Access {
        spec: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk '{spec}': {source}")]
    Walk {
        spec: String,
        #[source]
        source: walkdir::Error,
    },
}

/// Failure to read the content of a resolved script.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read script '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch script '{url}': {source}")]
    Fetch {
        url: String,
        #[source]
        source: BoxError,
    },
}

/// Failure to authenticate or open a session with one host.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("neither a password nor a private key path was provided")]
    NoCredentials,

    #[error("failed to read private key '{}': {source}", .path.display())]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("private key '{}' is encrypted but no passphrase was provided", .0.display())]
    PassphraseMissing(PathBuf),

    #[error("failed to decode private key '{}': {source}", .path.display())]
    KeyDecode {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("authentication rejected for {0}")]
    AuthRejected(String),

    #[error("failed to open session with {target}: {source}")]
    Session {
        target: String,
        #[source]
        source: BoxError,
    },
}

/// Failure of one script on one host.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("upload to '{remote_path}' failed: {source}")]
    Upload {
        remote_path: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to execute '{remote_path}': {source}")]
    Exec {
        remote_path: String,
        #[source]
        source: BoxError,
    },

    #[error("'{remote_path}' exited with status {status}")]
    NonZeroExit {
        remote_path: String,
        status: u32,
        output: String,
    },

    #[error("'{remote_path}' terminated without an exit status")]
    NoExitStatus { remote_path: String, output: String },
}

/// Errors that abort a run before any host is contacted.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Load(#[from] LoadError),
}
