//! Run command implementation.
//!
//! Validates the configuration, parses every connection string, resolves and
//! loads the scripts, then hands everything to the [`Dispatcher`]. All fatal
//! errors surface before the first connection is opened.

use std::sync::Arc;

use crate::config::RunConfig;
use crate::conn::parse_all;
use crate::dispatch::{Dispatcher, RunReport};
use crate::error::RunError;
use crate::source::{ScriptFetcher, ScriptResolver, load_scripts};
use crate::transport::Connector;

/// Executes scripts on every configured host.
pub struct RunCommand {
    connector: Arc<dyn Connector>,
    fetcher: Arc<dyn ScriptFetcher>,
}

impl RunCommand {
    /// Create a run command over the given transport and fetcher
    pub fn new(connector: Arc<dyn Connector>, fetcher: Arc<dyn ScriptFetcher>) -> Self {
        Self { connector, fetcher }
    }

    /// Execute the run
    pub async fn execute(&self, config: &RunConfig) -> Result<RunReport, RunError> {
        config.validate()?;
        let descriptors = parse_all(&config.hosts)?;

        let refs = ScriptResolver::new(config.recursive).resolve(&config.filenames)?;
        if refs.is_empty() {
            tracing::warn!("no scripts matched; hosts will only be connected to");
        }
        let scripts = load_scripts(&refs, self.fetcher.as_ref()).await?;
        tracing::info!(
            scripts = scripts.len(),
            hosts = descriptors.len(),
            "scripts loaded"
        );

        let dispatcher = Dispatcher::new(config.workers, Arc::clone(&self.connector), scripts)?
            .with_key(config.key_config())
            .with_staging_dir(&config.staging_dir);

        Ok(dispatcher.dispatch(descriptors).await?)
    }
}
