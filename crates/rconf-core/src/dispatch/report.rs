//! Per-host outcomes and the run report.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::source::ScriptRef;

// =============================================================================
// Outcomes
// =============================================================================

/// Final state of one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutcome {
    /// Every script uploaded and exited with status 0
    Success,
    /// No session could be opened; no script was attempted
    ConnectionFailed,
    /// The session opened but these scripts failed
    Failed(Vec<ScriptRef>),
}

impl HostOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for HostOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::ConnectionFailed => f.write_str("SSH Failed"),
            Self::Failed(scripts) => {
                f.write_str("Failed: ")?;
                for (i, script) in scripts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", script)?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for HostOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Host identity to outcome, written concurrently by every worker.
#[derive(Debug, Default)]
pub struct ResultsSink {
    entries: Mutex<HashMap<String, HostOutcome>>,
}

impl ResultsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the outcome for `host`, replacing any earlier one.
    pub fn record(&self, host: impl Into<String>, outcome: HostOutcome) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(host.into(), outcome);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every recorded entry, leaving the sink empty.
    pub fn drain(&self) -> Vec<HostResult> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *entries)
            .into_iter()
            .map(|(host, outcome)| HostResult { host, outcome })
            .collect()
    }
}

// =============================================================================
// Report
// =============================================================================

/// One row of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostResult {
    pub host: String,
    pub outcome: HostOutcome,
}

/// Everything a run produced, ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per host, in no particular order
    pub hosts: Vec<HostResult>,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.hosts.iter().all(|h| h.outcome.is_success())
    }

    pub fn failed_count(&self) -> usize {
        self.hosts
            .iter()
            .filter(|h| !h.outcome.is_success())
            .count()
    }

    pub fn outcome(&self, host: &str) -> Option<&HostOutcome> {
        self.hosts
            .iter()
            .find(|h| h.host == host)
            .map(|h| &h.outcome)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
