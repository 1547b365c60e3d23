//! rconf Core Library
//!
//! Runs a set of shell scripts on many hosts over SSH, a bounded number of
//! hosts at a time, and reports one outcome per host.

pub mod commands;
pub mod config;
pub mod conn;
pub mod dispatch;
pub mod error;
pub mod source;
pub mod transport;

/// Re-exports of commonly used types
pub mod prelude {
    // Commands
    pub use crate::commands::RunCommand;

    // Configuration
    pub use crate::config::{RunConfig, parse_config_file};

    // Connections
    pub use crate::conn::{ConnectionDescriptor, parse_all};

    // Scripts
    pub use crate::source::{
        HttpFetcher, ScriptFetcher, ScriptRef, ScriptResolver, ScriptSet, load_scripts,
    };

    // Dispatch
    pub use crate::dispatch::{Dispatcher, HostOutcome, HostResult, RunReport};

    // Transport
    pub use crate::transport::{
        Authenticator, CommandOutput, Connector, KeyConfig, RemoteSession, SshConnector,
    };

    // Errors
    pub use crate::error::{
        ConfigError, ConnectError, LoadError, ParseError, ResolveError, RunError, ScriptError,
    };
}
