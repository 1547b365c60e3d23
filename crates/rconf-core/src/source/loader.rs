//! Script content loading.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::LoadError;

use super::fetcher::ScriptFetcher;
use super::spec::ScriptRef;

/// Loaded script content, keyed by reference.
///
/// Built once by [`load_scripts`] and never mutated afterwards; host tasks
/// share it through an `Arc`. Iteration order is unspecified.
#[derive(Debug, Clone, Default)]
pub struct ScriptSet {
    scripts: HashMap<ScriptRef, Arc<[u8]>>,
}

impl ScriptSet {
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub fn get(&self, script: &ScriptRef) -> Option<&[u8]> {
        self.scripts.get(script).map(|content| &content[..])
    }

    pub fn contains(&self, script: &ScriptRef) -> bool {
        self.scripts.contains_key(script)
    }

    /// Iterate over every script and its content, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&ScriptRef, &[u8])> {
        self.scripts.iter().map(|(script, content)| (script, &content[..]))
    }
}

impl FromIterator<(ScriptRef, Vec<u8>)> for ScriptSet {
    fn from_iter<T: IntoIterator<Item = (ScriptRef, Vec<u8>)>>(iter: T) -> Self {
        Self {
            scripts: iter
                .into_iter()
                .map(|(script, content)| (script, Arc::from(content)))
                .collect(),
        }
    }
}

/// Read the content of every resolved reference.
///
/// URLs go through `fetcher`; anything else is read from the local
/// filesystem. The first failure aborts the whole pass, so no host ever runs
/// against a partially loaded set. Duplicate references collapse into one
/// entry.
pub async fn load_scripts(
    refs: &[ScriptRef],
    fetcher: &dyn ScriptFetcher,
) -> Result<ScriptSet, LoadError> {
    let mut scripts: HashMap<ScriptRef, Arc<[u8]>> = HashMap::with_capacity(refs.len());

    for script in refs {
        if scripts.contains_key(script) {
            continue;
        }

        let content = if script.is_url() {
            fetcher
                .fetch(script.as_str())
                .await
                .map_err(|source| LoadError::Fetch {
                    url: script.to_string(),
                    source: source.into(),
                })?
        } else {
            tokio::fs::read(script.as_str())
                .await
                .map_err(|source| LoadError::Read {
                    path: script.to_string(),
                    source,
                })?
        };

        tracing::debug!(script = %script, bytes = content.len(), "loaded script");
        scripts.insert(script.clone(), Arc::from(content));
    }

    Ok(ScriptSet { scripts })
}
