//! Core storage handle providing sandboxed, atomic file I/O.
//!
//! [`Storage`] owns the canonical root, the immutable upload policy and the
//! lock table. The individual operations live in sibling modules
//! (`upload`, `catalog`, `reorganize`, `remover`, `archive`) as further
//! `impl Storage` blocks.

use crate::builder::StorageBuilder;
use crate::error::{StorageError, StorageErrorExt};
use crate::locks::PathLocks;
use crate::maintenance;
use crate::security;
use crate::transform::Transform;
use fxhash::FxHashSet;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Marker embedded in temporary file names; such files are invisible to
/// listing, bulk removal and snapshots.
pub(crate) const TMP_MARKER: &str = ".pixtmp.";

/// Upload policy supplied once at construction.
#[derive(Debug, Clone)]
pub struct StoragePolicy {
    pub(crate) allowed_extensions: FxHashSet<String>,
    pub(crate) max_file_size: u64,
    pub(crate) default_folder: String,
    /// Ceiling on the total decompressed size of a restored snapshot.
    pub(crate) max_restore_size: u64,
}

impl StoragePolicy {
    #[must_use]
    pub fn allows(&self, extension: &str) -> bool {
        self.allowed_extensions.contains(extension)
    }

    /// Allowed extensions in sorted order.
    #[must_use]
    pub fn allowed_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.allowed_extensions.iter().cloned().collect();
        exts.sort_unstable();
        exts
    }

    #[must_use]
    pub const fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    #[must_use]
    pub const fn max_restore_size(&self) -> u64 {
        self.max_restore_size
    }

    #[must_use]
    pub fn default_folder(&self) -> &str {
        &self.default_folder
    }
}

/// The internal shared state of a [`Storage`] instance.
#[derive(Debug)]
pub struct StorageInner {
    /// Canonical physical root owning every stored object.
    pub(crate) root: PathBuf,
    /// Canonical directory receiving snapshot containers; never inside `root`.
    pub(crate) snapshot_dir: PathBuf,
    pub(crate) policy: StoragePolicy,
    pub(crate) transform: Arc<dyn Transform>,
    pub(crate) locks: PathLocks,
    pub(crate) tmp_counter: AtomicU64,
}

/// A thread-safe handle to the media store.
///
/// Cloning is cheap (`Arc`). Every path the handle touches is derived from
/// sanitized components and verified to stay under the root.
///
/// # Example
///
/// ```rust
/// use pixhost_storage::{Storage, StorageError, UploadRequest};
///
/// #[tokio::main]
/// async fn main() -> Result<(), StorageError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     let storage = Storage::builder()
///         .root(tmp.path().join("uploads"))
///         .snapshot_dir(tmp.path().join("backups"))
///         .connect()
///         .await?;
///
///     let receipt = storage.upload(UploadRequest::new(vec![1, 2, 3], "cat.PNG")).await?;
///     assert!(receipt.filename.ends_with(".png"));
///
///     let bytes = storage.read(&receipt.folder, &receipt.filename).await?;
///     assert_eq!(bytes, vec![1, 2, 3]);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Storage {
    pub(crate) inner: Arc<StorageInner>,
}

impl Deref for Storage {
    type Target = StorageInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Storage {
    #[must_use = "The storage engine is not initialized until you call .connect()"]
    pub fn builder() -> StorageBuilder {
        StorageBuilder::new()
    }

    /// Canonical storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    #[must_use]
    pub fn policy(&self) -> &StoragePolicy {
        &self.policy
    }

    /// Sanitizes `folder` and `filename` and resolves them under the root.
    ///
    /// An empty folder (after sanitization) addresses the root level; an empty
    /// file name is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Containment`] if the name is unusable or the
    /// resulting path would leave the root.
    pub fn resolve(&self, folder: &str, filename: &str) -> Result<PathBuf, StorageError> {
        let folder = security::sanitize_component(folder);
        let filename = security::require_component(filename, "file name")?;
        security::resolve(&self.root, &folder, &filename)
    }

    /// Reads a stored object.
    ///
    /// Names are matched exactly when they are plain components (see
    /// [`security::lookup_component`]), so every location the catalog reports
    /// can be read back.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if nothing is stored there.
    pub async fn read(&self, folder: &str, filename: &str) -> Result<Vec<u8>, StorageError> {
        let folder = security::lookup_component(folder);
        let filename = security::require_lookup(filename, "file name")?;
        let resolved = security::resolve(&self.root, &folder, &filename)?;
        if is_tmp_name(&resolved) {
            return Err(StorageError::not_found(resolved.display().to_string()));
        }

        match fs::read(&resolved).await {
            Ok(data) => Ok(data),
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory
                ) =>
            {
                Err(StorageError::not_found(resolved.display().to_string()))
            },
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Read failed: {}", resolved.display()).into()),
            }),
        }
    }

    /// Writes `data` to `resolved` atomically: unique temp file in the same
    /// directory, `fsync`, rename over the target, best-effort directory sync.
    /// Readers never observe a truncated file.
    pub(crate) async fn write_atomic(&self, resolved: &Path, data: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create folder for {}", resolved.display()))?;
        }

        let temp = unique_tmp_path(resolved, &self.tmp_counter);

        let written = async {
            let mut file = fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&temp)
                .await
                .context(format!("Temp creation failed: {}", temp.display()))?;
            file.write_all(data).await.context("Write failed")?;
            file.sync_all().await.context("Hardware sync failed")?;
            drop(file);

            fs::rename(&temp, resolved).await.context(format!(
                "Atomic swap failed: {} -> {}",
                temp.display(),
                resolved.display()
            ))
        }
        .await;

        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_file(&temp).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %temp.display(), error = %cleanup, "Failed to remove temp file");
                }
            }
            return Err(err);
        }

        if let Some(parent) = resolved.parent() {
            sync_dir(parent).await;
        }

        debug!(path = %resolved.display(), bytes = data.len(), "File saved atomically");
        Ok(())
    }

    /// Removes stale temp files from the root and the snapshot directory.
    pub async fn purge_tmp(&self) {
        maintenance::purge_tmp(&self.root).await;
        maintenance::purge_tmp(&self.snapshot_dir).await;
    }
}

pub(crate) async fn sync_dir(path: &Path) {
    match fs::File::open(path).await {
        Ok(dir) => {
            if let Err(err) = dir.sync_all().await {
                debug!(path = %path.display(), error = %err, "Directory sync failed");
            }
        },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Directory open failed");
        },
    }
}

pub(crate) fn is_tmp_name(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.contains(TMP_MARKER))
}

pub(crate) fn unique_tmp_path(target: &Path, counter: &AtomicU64) -> PathBuf {
    let counter = counter.fetch_add(1, Ordering::Relaxed);
    let file_name = target.file_name().and_then(|s| s.to_str()).unwrap_or("object");
    target.with_file_name(format!("{file_name}{TMP_MARKER}{}.{counter}", std::process::id()))
}
