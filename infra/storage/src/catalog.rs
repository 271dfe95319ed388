//! Recursive enumeration of stored objects.

use crate::engine::{Storage, StoragePolicy, is_tmp_name};
use crate::error::StorageError;
use crate::naming;
use crate::types::StoredObject;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// One regular file found under the root.
#[derive(Debug, Clone)]
pub(crate) struct FileEntry {
    pub(crate) path: PathBuf,
    /// Relative directory, `/`-separated; empty at the root level.
    pub(crate) folder: String,
    pub(crate) filename: String,
}

impl FileEntry {
    pub(crate) fn relative(&self) -> String {
        if self.folder.is_empty() {
            self.filename.clone()
        } else {
            format!("{}/{}", self.folder, self.filename)
        }
    }
}

/// Walks every regular file under `root`, skipping temp files. Symlinks are
/// neither followed nor reported. Entries whose names are not valid UTF-8
/// are skipped with a warning.
pub(crate) fn walk_files(root: PathBuf) -> impl Iterator<Item = Result<FileEntry, StorageError>> {
    WalkDir::new(&root).follow_links(false).min_depth(1).into_iter().filter_map(move |entry| {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                return Some(Err(StorageError::Io {
                    source: err.into(),
                    context: Some("Tree walk failed".into()),
                }));
            },
        };
        if !entry.file_type().is_file() || is_tmp_name(entry.path()) {
            return None;
        }

        let relative = entry.path().strip_prefix(&root).ok()?;
        let Some(filename) = relative.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %entry.path().display(), "Skipping non UTF-8 file name");
            return None;
        };
        let Some(folder) = relative.parent().and_then(folder_of) else {
            warn!(path = %entry.path().display(), "Skipping non UTF-8 folder name");
            return None;
        };

        Some(Ok(FileEntry { filename: filename.to_owned(), folder, path: entry.into_path() }))
    })
}

fn folder_of(parent: &Path) -> Option<String> {
    parent
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()
        .map(|parts| parts.join("/"))
}

/// Lower-case hex SHA-256 of `bytes`.
#[must_use]
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub(crate) fn digest_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Lazy, restartable listing of stored objects.
///
/// Created by [`Storage::catalog`]. Each call to `next` performs blocking
/// filesystem I/O (metadata and a full read for the digest); use
/// [`Storage::list`] from async code. Only files whose extension is on the
/// allow-list are yielded. Order is unspecified.
pub struct Catalog {
    files: Box<dyn Iterator<Item = Result<FileEntry, StorageError>> + Send>,
    policy: StoragePolicy,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").finish_non_exhaustive()
    }
}

impl Iterator for Catalog {
    type Item = Result<StoredObject, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.files.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err)),
            };
            if !naming::extension_of(&entry.filename).is_some_and(|ext| self.policy.allows(&ext)) {
                continue;
            }

            match describe(entry) {
                Ok(object) => return Some(Ok(object)),
                // Removed between the walk and the stat.
                Err(StorageError::NotFound { .. }) => {},
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

fn describe(entry: FileEntry) -> Result<StoredObject, StorageError> {
    let map_io = |err: std::io::Error, path: &Path| {
        if err.kind() == std::io::ErrorKind::NotFound {
            StorageError::not_found(path.display().to_string())
        } else {
            StorageError::Io { source: err, context: Some(format!("Failed to describe {}", path.display()).into()) }
        }
    };

    let meta = std::fs::metadata(&entry.path).map_err(|e| map_io(e, &entry.path))?;
    let modified = meta.modified().map_err(|e| map_io(e, &entry.path))?;
    let digest = digest_file(&entry.path).map_err(|e| map_io(e, &entry.path))?;

    Ok(StoredObject {
        filename: entry.filename,
        folder: entry.folder,
        size: meta.len(),
        digest,
        modified: DateTime::<Utc>::from(modified),
    })
}

impl Storage {
    /// Starts a fresh walk of the tree. See [`Catalog`].
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        Catalog { files: Box::new(walk_files(self.root.clone())), policy: self.policy.clone() }
    }

    /// Collects the catalog on the blocking pool.
    ///
    /// Individual files that fail to be described are logged and skipped, so
    /// one unreadable file does not hide the rest of the store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the background task fails.
    pub async fn list(&self) -> Result<Vec<StoredObject>, StorageError> {
        let catalog = self.catalog();
        let objects = tokio::task::spawn_blocking(move || {
            catalog
                .filter_map(|item| {
                    item.inspect_err(|err| warn!(error = %err, "Skipping unlistable entry")).ok()
                })
                .collect::<Vec<_>>()
        })
        .await?;

        Ok(objects)
    }
}
