//! Script sources.
//!
//! This module turns the user's script specifications into loaded content:
//! - Resolution: paths, globs, directories and URLs to a sorted list of [`ScriptRef`]
//! - Fetching: remote URLs over HTTP ([`HttpFetcher`])
//! - Loading: every reference read once into a shared, read-only [`ScriptSet`]

mod fetcher;
mod loader;
mod resolver;
mod spec;

pub use fetcher::{HttpFetcher, ScriptFetcher};
pub use loader::{ScriptSet, load_scripts};
pub use resolver::{SCRIPT_EXTENSIONS, ScriptResolver};
pub use spec::{ScriptRef, is_url};
