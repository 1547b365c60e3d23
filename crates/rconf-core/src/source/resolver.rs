//! Script set resolver implementation.

use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use walkdir::WalkDir;

use crate::error::ResolveError;

use super::spec::{ScriptRef, is_url};

/// Extensions kept when discovering scripts inside a directory.
///
/// Explicitly named files and glob matches bypass this filter.
pub const SCRIPT_EXTENSIONS: &[&str] = &["sh"];

/// Characters that turn a specification into a glob pattern.
const GLOB_CHARS: &[char] = &['*', '?', '['];

/// Expands script specifications into an ordered list of script references.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptResolver {
    /// Descend into subdirectories when walking a directory
    recursive: bool,
}

impl ScriptResolver {
    /// Create a new ScriptResolver.
    pub fn new(recursive: bool) -> Self {
        Self { recursive }
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    /// Resolve every specification and return the combined, sorted list.
    ///
    /// Entries are sorted lexicographically but not deduplicated. The first
    /// failing specification aborts the whole call.
    pub fn resolve<S: AsRef<str>>(&self, specs: &[S]) -> Result<Vec<ScriptRef>, ResolveError> {
        let mut refs = Vec::new();
        for spec in specs {
            refs.extend(self.resolve_spec(spec.as_ref())?);
        }
        refs.sort();
        tracing::debug!(count = refs.len(), "resolved script set");
        Ok(refs)
    }

    /// Resolve one specification.
    ///
    /// Handles:
    /// - `http(s)://host/...` -> the URL itself, without touching the filesystem
    /// - `dir/*.sh` -> every matching file, regardless of extension
    /// - `dir` -> files with an allowed extension (top level only unless recursive)
    /// - `file` -> the file itself, regardless of extension
    pub fn resolve_spec(&self, spec: &str) -> Result<Vec<ScriptRef>, ResolveError> {
        if is_url(spec) {
            return Ok(vec![ScriptRef::new(spec)]);
        }

        if spec.contains(GLOB_CHARS) {
            return expand_glob(spec);
        }

        let path = Path::new(spec);
        let metadata = std::fs::metadata(path).map_err(|source| ResolveError::Access {
            spec: spec.to_string(),
            source,
        })?;

        if metadata.is_dir() {
            return self.walk_dir(spec, path);
        }

        Ok(vec![path_ref(&clean_path(path))])
    }

    /// Collect files with an allowed extension from a directory.
    fn walk_dir(&self, spec: &str, dir: &Path) -> Result<Vec<ScriptRef>, ResolveError> {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut refs = Vec::new();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(max_depth) {
            let entry = entry.map_err(|source| ResolveError::Walk {
                spec: spec.to_string(),
                source,
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            if !has_allowed_extension(entry.path()) {
                tracing::debug!(path = %entry.path().display(), "skipping non-script file");
                continue;
            }
            refs.push(path_ref(&clean_path(entry.path())));
        }

        Ok(refs)
    }
}

/// Expand a glob pattern against the filesystem.
///
/// The walk starts at the longest wildcard-free directory prefix of the
/// pattern. `*` does not cross path separators; `**` does. A pattern that
/// matches nothing, including one whose prefix does not exist, yields an
/// empty list. Repeated separators are collapsed before matching, so
/// `d//*.sh` behaves like `d/*.sh`.
fn expand_glob(pattern: &str) -> Result<Vec<ScriptRef>, ResolveError> {
    let normalized: PathBuf = Path::new(pattern).components().collect();
    let matcher = GlobBuilder::new(&normalized.to_string_lossy())
        .literal_separator(true)
        .build()
        .map_err(|source| ResolveError::Glob {
            pattern: pattern.to_string(),
            source,
        })?
        .compile_matcher();

    let (base, remaining) = split_glob_base(&normalized);
    let walk_root = if base.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        base.clone()
    };
    if !walk_root.is_dir() {
        return Ok(Vec::new());
    }

    let max_depth = if pattern.contains("**") {
        usize::MAX
    } else {
        remaining
    };

    let mut refs = Vec::new();
    for entry in WalkDir::new(&walk_root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(true)
    {
        let entry = entry.map_err(|source| ResolveError::Walk {
            spec: pattern.to_string(),
            source,
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        // Relative patterns without a directory prefix are matched
        // against paths relative to the current directory.
        let candidate = if base.as_os_str().is_empty() {
            entry.path().strip_prefix(".").unwrap_or(entry.path())
        } else {
            entry.path()
        };
        if matcher.is_match(candidate) {
            refs.push(path_ref(candidate));
        }
    }

    Ok(refs)
}

/// Split a pattern into its wildcard-free prefix and the number of
/// components that follow it.
fn split_glob_base(pattern: &Path) -> (PathBuf, usize) {
    let mut base = PathBuf::new();
    let mut components = pattern.components();

    while let Some(component) = components.next() {
        if component.as_os_str().to_string_lossy().contains(GLOB_CHARS) {
            return (base, components.count() + 1);
        }
        base.push(component);
    }

    (base, 0)
}

fn has_allowed_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy())
        .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext.as_ref()))
}

/// Lexically normalise a path: drop `.` components and fold `..` where a
/// preceding normal component exists.
fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(cleaned.components().next_back(), Some(Component::Normal(_))) {
                    cleaned.pop();
                } else {
                    cleaned.push(component);
                }
            }
            other => cleaned.push(other),
        }
    }
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

fn path_ref(path: &Path) -> ScriptRef {
    ScriptRef::new(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_path_drops_current_dir() {
        assert_eq!(clean_path(Path::new("./a//b.sh")), PathBuf::from("a/b.sh"));
    }

    #[test]
    fn clean_path_folds_parent_dir() {
        assert_eq!(clean_path(Path::new("a/x/../b.sh")), PathBuf::from("a/b.sh"));
        assert_eq!(clean_path(Path::new("../b.sh")), PathBuf::from("../b.sh"));
    }

    #[test]
    fn split_glob_base_stops_at_wildcard() {
        let (base, remaining) = split_glob_base(Path::new("/srv/scripts/*/run-*.sh"));
        assert_eq!(base, PathBuf::from("/srv/scripts"));
        assert_eq!(remaining, 2);
    }

    #[test]
    fn split_glob_base_relative_pattern() {
        let (base, remaining) = split_glob_base(Path::new("*.sh"));
        assert!(base.as_os_str().is_empty());
        assert_eq!(remaining, 1);
    }

    #[test]
    fn allowed_extension_check() {
        assert!(has_allowed_extension(Path::new("deploy.sh")));
        assert!(!has_allowed_extension(Path::new("notes.txt")));
        assert!(!has_allowed_extension(Path::new("Makefile")));
    }
}
