//! Bounded fan-out of host pipelines.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::conn::ConnectionDescriptor;
use crate::error::ConfigError;
use crate::source::ScriptSet;
use crate::transport::{Connector, KeyConfig};

use super::pipeline::HostTask;
use super::report::{HostOutcome, ResultsSink, RunReport};

/// Default number of hosts processed at once.
pub const DEFAULT_WORKERS: usize = 2;

/// Default remote directory scripts are uploaded to.
pub const DEFAULT_STAGING_DIR: &str = "/tmp";

/// Runs one pipeline per host with at most `workers` of them in flight.
pub struct Dispatcher {
    semaphore: Arc<Semaphore>,
    workers: usize,
    connector: Arc<dyn Connector>,
    scripts: Arc<ScriptSet>,
    key: Arc<KeyConfig>,
    staging_dir: Arc<str>,
}

impl Dispatcher {
    pub fn new(
        workers: usize,
        connector: Arc<dyn Connector>,
        scripts: ScriptSet,
    ) -> Result<Self, ConfigError> {
        if workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
            connector,
            scripts: Arc::new(scripts),
            key: Arc::new(KeyConfig::default()),
            staging_dir: Arc::from(DEFAULT_STAGING_DIR),
        })
    }

    /// Private key used for hosts without a password.
    pub fn with_key(mut self, key: KeyConfig) -> Self {
        self.key = Arc::new(key);
        self
    }

    pub fn with_staging_dir(mut self, dir: impl AsRef<str>) -> Self {
        self.staging_dir = Arc::from(dir.as_ref());
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Launch every host at once and wait for all of them.
    ///
    /// Each worker holds a semaphore permit for the whole pipeline and records
    /// exactly one outcome, including when the pipeline panics.
    pub async fn dispatch(
        &self,
        descriptors: Vec<ConnectionDescriptor>,
    ) -> Result<RunReport, ConfigError> {
        let mut seen = HashSet::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let identity = descriptor.identity();
            if !seen.insert(identity.clone()) {
                return Err(ConfigError::DuplicateHost(identity));
            }
        }

        let started_at = Utc::now();
        let sink = Arc::new(ResultsSink::new());
        let mut workers = JoinSet::new();

        tracing::info!(
            hosts = descriptors.len(),
            scripts = self.scripts.len(),
            workers = self.workers,
            "dispatching"
        );

        for descriptor in descriptors {
            let task = HostTask {
                descriptor,
                scripts: Arc::clone(&self.scripts),
                key: Arc::clone(&self.key),
                staging_dir: Arc::clone(&self.staging_dir),
                connector: Arc::clone(&self.connector),
            };
            let semaphore = Arc::clone(&self.semaphore);
            let sink = Arc::clone(&sink);

            workers.spawn(async move {
                let identity = task.identity();
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        tracing::error!(host = %identity, error = %e, "worker pool closed");
                        sink.record(identity, HostOutcome::ConnectionFailed);
                        return;
                    }
                };

                let outcome = match tokio::spawn(task.run()).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(host = %identity, error = %e, "host pipeline aborted");
                        HostOutcome::ConnectionFailed
                    }
                };
                sink.record(identity, outcome);
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "worker terminated abnormally");
            }
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            hosts: sink.drain(),
        };
        tracing::info!(
            hosts = report.hosts.len(),
            failed = report.failed_count(),
            "dispatch finished"
        );
        Ok(report)
    }
}
