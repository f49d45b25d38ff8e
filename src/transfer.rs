// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Bulk transfer of data folders to and from object storage.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{AnnotateError, Result};
use crate::logging::LogSink;

/// Files and bytes moved by one transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub files: usize,
    pub bytes: u64,
}

impl TransferStats {
    /// Size in mebibytes.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}

/// A bucket/prefix keyed object store.
pub trait ObjectStore {
    /// Copy every object under `prefix` into `local_dir`, keeping the key
    /// structure below the prefix.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError::Transfer`] if the prefix cannot be listed or
    /// an object cannot be copied.
    fn download_prefix(&self, bucket: &str, prefix: &str, local_dir: &Path) -> Result<TransferStats>;

    /// Copy every file under `local_dir` to `prefix`, keeping relative paths.
    /// Files that fail are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError::Transfer`] if `local_dir` cannot be walked.
    fn upload_dir(&self, local_dir: &Path, bucket: &str, prefix: &str) -> Result<TransferStats>;
}

/// Object store backed by a directory tree laid out as `<root>/<bucket>/<key>`.
pub struct DirectoryStore<'a> {
    root: PathBuf,
    log: &'a dyn LogSink,
}

impl<'a> DirectoryStore<'a> {
    /// Use `root` as the store.
    pub fn new<P: Into<PathBuf>>(root: P, log: &'a dyn LogSink) -> Self {
        Self {
            root: root.into(),
            log,
        }
    }

    fn location(&self, bucket: &str, prefix: &str) -> PathBuf {
        let mut path = self.root.join(bucket);
        path.extend(prefix.split('/').filter(|part| !part.is_empty()));
        path
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<u64> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AnnotateError::Transfer(format!("Failed to create {}: {e}", parent.display()))
        })?;
    }
    fs::copy(from, to).map_err(|e| {
        AnnotateError::Transfer(format!(
            "Failed to copy {} to {}: {e}",
            from.display(),
            to.display()
        ))
    })
}

/// Regular files below `dir` with their paths relative to it, sorted.
fn files_below(dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            AnnotateError::Transfer(format!("Failed to list {}: {e}", dir.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(dir) {
            files.push((entry.path().to_path_buf(), relative.to_path_buf()));
        }
    }
    Ok(files)
}

impl ObjectStore for DirectoryStore<'_> {
    fn download_prefix(&self, bucket: &str, prefix: &str, local_dir: &Path) -> Result<TransferStats> {
        let source = self.location(bucket, prefix);
        if !source.is_dir() {
            return Err(AnnotateError::Transfer(format!(
                "No objects under {bucket}/{prefix}"
            )));
        }

        let mut stats = TransferStats::default();
        for (path, relative) in files_below(&source)? {
            stats.bytes += copy_file(&path, &local_dir.join(relative))?;
            stats.files += 1;
        }
        self.log.info(&format!(
            "Downloaded {} files with a total size of {:.2} MB in the folder {}",
            stats.files,
            stats.megabytes(),
            local_dir.display()
        ));
        Ok(stats)
    }

    fn upload_dir(&self, local_dir: &Path, bucket: &str, prefix: &str) -> Result<TransferStats> {
        let target = self.location(bucket, prefix);
        let mut stats = TransferStats::default();
        for (path, relative) in files_below(local_dir)? {
            match copy_file(&path, &target.join(&relative)) {
                Ok(bytes) => {
                    stats.files += 1;
                    stats.bytes += bytes;
                }
                Err(e) => self
                    .log
                    .warn(&format!("Failed to upload {}. Reason: {e}", path.display())),
            }
        }
        self.log.info(&format!(
            "Uploaded {} files to {bucket}/{prefix}",
            stats.files
        ));
        Ok(stats)
    }
}
