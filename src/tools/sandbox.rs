//! Sandbox root for file-system tools
//!
//! Every path a built-in tool touches is resolved against the sandbox root
//! and must stay inside it. `.` and `..` are folded first, then the deepest
//! existing ancestor is canonicalized so a symlink cannot lead out of the
//! root. The part that doesn't exist yet is appended under it as written.

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

/// Root directory that file-system tools are confined to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Create a sandbox rooted at `root` (made absolute, canonicalized when it exists)
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        let root = absolute.canonicalize().unwrap_or_else(|_| normalize(&absolute));
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a user-supplied path inside the sandbox
    ///
    /// Relative paths are joined onto the root; absolute paths must already
    /// point inside it.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let path = path.trim();
        if path.is_empty() {
            anyhow::bail!("Path must not be empty");
        }

        let candidate = Path::new(path);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        let resolved = normalize(&joined);
        if !resolved.starts_with(&self.root) {
            return Err(self.outside(path));
        }

        let (existing, missing) = split_existing(&resolved);
        let canonical = existing
            .canonicalize()
            .with_context(|| format!("Failed to resolve '{}'", path))?;
        if !canonical.starts_with(&self.root) {
            tracing::warn!(
                "[Sandbox] '{}' leads to {} through a link",
                path,
                canonical.display()
            );
            return Err(self.outside(path));
        }

        if missing.as_os_str().is_empty() {
            Ok(canonical)
        } else {
            Ok(canonical.join(missing))
        }
    }

    fn outside(&self, path: &str) -> anyhow::Error {
        anyhow::anyhow!(
            "Path '{}' is outside the sandbox root {}",
            path,
            self.root.display()
        )
    }

    /// Whether an existing path really lives inside the root
    ///
    /// Directory walks use this to skip entries reached through a link.
    pub fn contains(&self, path: &Path) -> bool {
        path.canonicalize()
            .map(|canonical| canonical.starts_with(&self.root))
            .unwrap_or(false)
    }

    /// Path relative to the root, for display
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

/// Split into the deepest ancestor present on disk and the remainder
///
/// A dangling link counts as present, so canonicalizing it fails instead of
/// being written through.
fn split_existing(path: &Path) -> (&Path, PathBuf) {
    for ancestor in path.ancestors() {
        if ancestor.symlink_metadata().is_ok() {
            let missing = path.strip_prefix(ancestor).map(Path::to_path_buf).unwrap_or_default();
            return (ancestor, missing);
        }
    }
    (path, PathBuf::new())
}

/// Fold `.` and `..` components without touching the file system
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
