//! Script reference type.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

/// Name used when a reference has no usable final segment.
const FALLBACK_BASE_NAME: &str = "script";

/// Identifier of one script: a local path or a URL.
///
/// References are compared and sorted as plain strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptRef(String);

impl ScriptRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this reference points at a remote URL.
    pub fn is_url(&self) -> bool {
        is_url(&self.0)
    }

    /// Final name segment, used to name the uploaded copy.
    ///
    /// For URLs this is the last non-empty path segment; for local paths the
    /// file name.
    pub fn base_name(&self) -> String {
        let name = if self.is_url() {
            Url::parse(&self.0).ok().and_then(|url| {
                url.path_segments()
                    .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                    .map(str::to_string)
            })
        } else {
            Path::new(&self.0)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        };
        name.unwrap_or_else(|| FALLBACK_BASE_NAME.to_string())
    }
}

impl fmt::Display for ScriptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScriptRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ScriptRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Check whether `s` is URL-shaped: it parses, and has a scheme and a host.
pub fn is_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => !url.scheme().is_empty() && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}
