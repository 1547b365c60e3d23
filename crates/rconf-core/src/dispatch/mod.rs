//! Host dispatch.
//!
//! The [`Dispatcher`] launches one worker per connection descriptor. Workers
//! share a semaphore sized to the worker limit, the loaded [`ScriptSet`] and a
//! [`ResultsSink`]; each runs the host pipeline (connect, upload and execute
//! every script, disconnect) and records a single [`HostOutcome`].
//!
//! [`ScriptSet`]: crate::source::ScriptSet

mod dispatcher;
mod pipeline;
mod report;

pub use dispatcher::{DEFAULT_STAGING_DIR, DEFAULT_WORKERS, Dispatcher};
pub use pipeline::remote_path;
pub use report::{HostOutcome, HostResult, ResultsSink, RunReport};
