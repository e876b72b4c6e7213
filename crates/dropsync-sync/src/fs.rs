//! Local filesystem collaborator backed by `tokio::fs` and `walkdir`

use async_trait::async_trait;
use dropsync_types::{Error, Filesystem, RemoveOutcome, Result, WalkEntry};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// The real local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    /// Create a new local filesystem handle
    pub const fn new() -> Self {
        Self
    }

    fn walk_blocking(root: &Path) -> Result<Vec<WalkEntry>> {
        let mut dirs: BTreeMap<PathBuf, WalkEntry> = BTreeMap::new();
        dirs.insert(root.to_path_buf(), empty_entry(root));

        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                match e.into_io_error() {
                    Some(io) => Error::io_at("walk", &path, &io),
                    None => Error::Io {
                        message: format!("Failed to walk '{}'", path.display()),
                    },
                }
            })?;

            let Some(parent) = entry.path().parent() else {
                continue;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().is_dir();

            let parent_entry = dirs
                .entry(parent.to_path_buf())
                .or_insert_with(|| empty_entry(parent));
            if is_dir {
                parent_entry.subdirs.push(name);
                dirs.entry(entry.path().to_path_buf())
                    .or_insert_with(|| empty_entry(entry.path()));
            } else {
                parent_entry.files.push(name);
            }
        }

        Ok(dirs.into_values().collect())
    }
}

fn empty_entry(dir: &Path) -> WalkEntry {
    WalkEntry {
        dir: dir.to_path_buf(),
        subdirs: Vec::new(),
        files: Vec::new(),
    }
}

async fn has_entries(path: &Path) -> bool {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn make_dirs(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| Error::io_at("create folder", path, &e))
    }

    async fn remove_file(&self, path: &Path) -> Result<RemoveOutcome> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(RemoveOutcome::Removed),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(RemoveOutcome::AlreadyAbsent),
            Err(e) => Err(Error::io_at("remove file", path, &e)),
        }
    }

    async fn remove_dir(&self, path: &Path) -> Result<RemoveOutcome> {
        let e = match tokio::fs::remove_dir(path).await {
            Ok(()) => return Ok(RemoveOutcome::Removed),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RemoveOutcome::AlreadyAbsent),
            Err(e) => e,
        };
        if e.kind() == ErrorKind::DirectoryNotEmpty || has_entries(path).await {
            return Err(Error::DirectoryNotEmpty {
                path: path.to_path_buf(),
            });
        }
        Err(Error::io_at("remove folder", path, &e))
    }

    async fn modified_time(&self, path: &Path) -> Result<SystemTime> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => Error::io_at("stat", path, &e),
        })?;
        metadata
            .modified()
            .map_err(|e| Error::io_at("read modification time of", path, &e))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| Error::io_at("read", path, &e))
    }

    async fn walk(&self, root: &Path) -> Result<Vec<WalkEntry>> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || Self::walk_blocking(&root))
            .await
            .map_err(|e| Error::other(format!("Walk task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_remove_missing_is_absorbed() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFilesystem::new();

        assert_eq!(
            fs.remove_file(&dir.path().join("gone.txt")).await.unwrap(),
            RemoveOutcome::AlreadyAbsent
        );
        assert_eq!(
            fs.remove_dir(&dir.path().join("gone")).await.unwrap(),
            RemoveOutcome::AlreadyAbsent
        );
    }

    #[tokio::test]
    async fn test_remove_non_empty_dir_is_reportable() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("docs");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("keep.txt"), b"keep").unwrap();

        let err = LocalFilesystem::new().remove_dir(&folder).await.unwrap_err();
        assert!(err.is_reportable());
        assert!(matches!(err, Error::DirectoryNotEmpty { ref path } if *path == folder));
        assert!(folder.exists());
    }

    #[tokio::test]
    async fn test_walk_groups_by_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a").join("b")).unwrap();
        std::fs::write(dir.path().join("top.txt"), b"t").unwrap();
        std::fs::write(dir.path().join("a").join("b").join("deep.txt"), b"d").unwrap();

        let entries = LocalFilesystem::new().walk(dir.path()).await.unwrap();
        let root = entries.iter().find(|e| e.dir == dir.path()).unwrap();
        assert_eq!(root.subdirs, vec!["a".to_string()]);
        assert_eq!(root.files, vec!["top.txt".to_string()]);

        let deep = entries
            .iter()
            .find(|e| e.dir == dir.path().join("a").join("b"))
            .unwrap();
        assert_eq!(deep.files, vec!["deep.txt".to_string()]);
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test]
    async fn test_modified_time_of_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = LocalFilesystem::new()
            .modified_time(&dir.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }
}
