//! Normalized path handling for cross-platform compatibility
//!
//! Every state map is keyed by [`SyncPath`]. Local paths arrive with the
//! platform separator, remote paths arrive with a leading slash; both are
//! folded into the same root-relative, forward-slash form so that membership
//! tests never depend on where a path came from.

use std::borrow::Borrow;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// A root-relative path normalized to forward slashes.
///
/// The empty path is the sync root. Segments are never empty and never `.`;
/// `..` segments are resolved lexically and cannot climb above the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "String", into = "String")
)]
pub struct SyncPath {
    inner: String,
}

impl SyncPath {
    /// The sync root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Normalize any string form: backslashes become separators, leading and
    /// duplicate slashes are dropped.
    pub fn new(path: impl AsRef<str>) -> Self {
        let raw = path.as_ref().replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        Self {
            inner: segments.join("/"),
        }
    }

    /// Normalize a remote display path such as `/Docs/a.txt`.
    pub fn from_remote(path: &str) -> Self {
        Self::new(path)
    }

    /// Normalize a native path that is already relative to the sync root.
    pub fn from_native(path: &Path) -> Self {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => segments.push(name.to_string_lossy().into_owned()),
                Component::ParentDir => {
                    segments.pop();
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        Self::new(segments.join("/"))
    }

    /// Normalize a native path under `root`. Returns `None` when `path` is
    /// not inside `root`.
    pub fn from_native_under(root: &Path, path: &Path) -> Option<Self> {
        path.strip_prefix(root).ok().map(Self::from_native)
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Whether this is the sync root.
    pub fn is_root(&self) -> bool {
        self.inner.is_empty()
    }

    /// The form remote calls expect: a leading slash, and the empty string
    /// for the root.
    pub fn to_remote(&self) -> String {
        if self.is_root() {
            String::new()
        } else {
            format!("/{}", self.inner)
        }
    }

    /// Convert to a platform-native path under `root` for I/O operations.
    pub fn to_native(&self, root: &Path) -> PathBuf {
        self.segments()
            .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
    }

    /// Iterate over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.inner.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments; the root has depth 0.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Join this path with a segment.
    pub fn join(&self, segment: &str) -> Self {
        if self.is_root() {
            Self::new(segment)
        } else {
            Self::new(format!("{}/{}", self.inner, segment))
        }
    }

    /// Get the parent directory. The parent of a top-level entry is the root;
    /// the root has no parent.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.inner.rfind('/') {
            Some(idx) => Some(Self {
                inner: self.inner[..idx].to_string(),
            }),
            None => Some(Self::root()),
        }
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        self.inner.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Segment-wise prefix test; every path starts with the root.
    pub fn starts_with(&self, ancestor: &Self) -> bool {
        if ancestor.is_root() {
            return true;
        }
        self.inner == ancestor.inner
            || (self.inner.starts_with(&ancestor.inner)
                && self.inner.as_bytes().get(ancestor.inner.len()) == Some(&b'/'))
    }
}

impl AsRef<str> for SyncPath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

// Lookups by `&str` are only sound for already-normalized strings.
impl Borrow<str> for SyncPath {
    fn borrow(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for SyncPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.inner)
        }
    }
}

impl From<&str> for SyncPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SyncPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&Path> for SyncPath {
    fn from(path: &Path) -> Self {
        Self::from_native(path)
    }
}

impl From<SyncPath> for String {
    fn from(path: SyncPath) -> Self {
        path.inner
    }
}
