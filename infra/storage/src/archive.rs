//! Full-store snapshots as ZIP containers.
//!
//! Creation walks every regular file under the root (temp files excluded,
//! the allow-list is ignored) and stores it at its `/`-separated relative
//! path. Restoration decodes and CRC-checks the whole container in memory
//! before the store is touched, so a corrupt upload never causes a partial
//! extraction.

use crate::catalog::walk_files;
use crate::engine::{Storage, TMP_MARKER, sync_dir, unique_tmp_path};
use crate::error::{StorageError, StorageErrorExt};
use crate::security;
use crate::types::{RestoreReport, SnapshotInfo};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::result::ZipError;
use zip::write::{FileOptions, ZipWriter};
use zip::{CompressionMethod, ZipArchive};

const SNAPSHOT_PREFIX: &str = "snapshot_";
const SNAPSHOT_SUFFIX: &str = ".zip";

/// One decoded archive entry awaiting extraction.
#[derive(Debug)]
struct PendingEntry {
    relative: PathBuf,
    data: Vec<u8>,
}

impl Storage {
    /// Writes a snapshot of the whole store into the snapshot directory.
    ///
    /// Holds the store exclusively while the container is written, so the
    /// snapshot reflects a single instant.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if a file cannot be read or the
    /// container cannot be written. No partial container is left behind.
    pub async fn create_snapshot(&self) -> Result<SnapshotInfo, StorageError> {
        let id = format!(
            "{SNAPSHOT_PREFIX}{}_{}{SNAPSHOT_SUFFIX}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let target = self.snapshot_dir.join(&id);
        let temp = unique_tmp_path(&target, &self.tmp_counter);

        let _gate = self.locks.exclusive().await;

        let root = self.root.clone();
        let temp_path = temp.clone();
        let written = tokio::task::spawn_blocking(move || write_container(&root, &temp_path)).await;

        let entries = match written {
            Ok(Ok(entries)) => entries,
            Ok(Err(err)) => {
                discard(&temp).await;
                return Err(err);
            },
            Err(err) => {
                discard(&temp).await;
                return Err(err.into());
            },
        };

        fs::rename(&temp, &target)
            .await
            .context(format!("Failed to publish snapshot {id}"))?;
        sync_dir(&self.snapshot_dir).await;

        let size = fs::metadata(&target).await.context("Failed to stat snapshot")?.len();
        info!(id = %id, entries, size, "Snapshot created");

        Ok(SnapshotInfo { reference: id.clone(), id, size, created_at: Utc::now() })
    }

    /// Lists snapshot containers, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the snapshot directory cannot be read.
    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>, StorageError> {
        let mut dir = fs::read_dir(&self.snapshot_dir)
            .await
            .context("Failed to read snapshot directory")?;

        let mut snapshots = Vec::new();
        while let Some(entry) = dir.next_entry().await.context("Failed to read snapshot directory")? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else { continue };
            if !is_snapshot_name(&name) {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(err) => {
                    warn!(snapshot = %name, error = %err, "Skipping unreadable snapshot");
                    continue;
                },
            };
            let created_at = meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
            snapshots.push(SnapshotInfo { reference: name.clone(), id: name, size: meta.len(), created_at });
        }

        snapshots.sort_unstable_by(|a, b| b.id.cmp(&a.id));
        Ok(snapshots)
    }

    /// Returns the bytes of snapshot `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Containment`] if `id` is not a plain name and
    /// [`StorageError::NotFound`] if no such snapshot exists.
    pub async fn read_snapshot(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        let sanitized = security::require_component(id, "snapshot id")?;
        if sanitized != id {
            return Err(StorageError::containment(id.to_owned(), "Snapshot id is not a plain name"));
        }
        if !is_snapshot_name(id) {
            return Err(StorageError::not_found(id.to_owned()));
        }

        match fs::read(self.snapshot_dir.join(id)).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(StorageError::not_found(id.to_owned())),
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Failed to read snapshot {id}").into()),
            }),
        }
    }

    /// Restores a snapshot container into the store.
    ///
    /// Every entry is decompressed and checksum-verified first; only a fully
    /// valid container proceeds. With `clear_existing` the root is emptied
    /// before extraction (the root directory itself is kept). Existing files
    /// at the same paths are replaced atomically.
    ///
    /// # Errors
    ///
    /// - [`StorageError::BadArchive`] if the container is malformed, corrupt,
    ///   holds duplicate or overlapping entries, or decompresses beyond
    ///   [`StoragePolicy::max_restore_size`](crate::StoragePolicy::max_restore_size).
    ///   The store is untouched.
    /// - [`StorageError::Conflict`] if an entry would land on an existing
    ///   folder or below an existing file. Nothing is written.
    /// - [`StorageError::Containment`] if an entry path would escape the
    ///   root. The store is untouched.
    /// - [`StorageError::Io`] if clearing or extraction fails midway.
    pub async fn restore_snapshot(
        &self,
        archive: Vec<u8>,
        clear_existing: bool,
    ) -> Result<RestoreReport, StorageError> {
        let limit = self.policy.max_restore_size;
        let entries = tokio::task::spawn_blocking(move || decode_container(archive, limit)).await??;

        let _gate = self.locks.exclusive().await;

        if clear_existing {
            clear_root(&self.root).await?;
            info!(root = %self.root.display(), "Storage root cleared for restore");
        }

        let targets = entries
            .iter()
            .map(|entry| security::resolve_relative(&self.root, &to_slash(&entry.relative)))
            .collect::<Result<Vec<_>, _>>()?;
        check_targets(&self.root, &targets).await?;

        let restored = entries.len();
        for (entry, target) in entries.iter().zip(&targets) {
            self.write_atomic(target, &entry.data).await?;
        }

        info!(restored, clear_existing, "Snapshot restored");
        Ok(RestoreReport { restored })
    }
}

fn is_snapshot_name(name: &str) -> bool {
    name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(SNAPSHOT_SUFFIX) && !name.contains(TMP_MARKER)
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn zip_failure(err: ZipError, context: String) -> StorageError {
    match err {
        ZipError::Io(source) => StorageError::Io { source, context: Some(context.into()) },
        other => StorageError::Internal { message: other.to_string().into(), context: Some(context.into()) },
    }
}

/// Streams every file under `root` into a new container at `dest`.
/// Returns the number of entries written.
fn write_container(root: &Path, dest: &Path) -> Result<usize, StorageError> {
    let file = std::fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(dest)
        .context(format!("Failed to create {}", dest.display()))?;

    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut count = 0;
    for entry in walk_files(root.to_path_buf()) {
        let entry = entry?;
        let relative = entry.relative();

        let mut source = match std::fs::File::open(&entry.path) {
            Ok(source) => source,
            // Removed by a reader-side race; nothing to capture.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Failed to open {relative}").into()),
                });
            },
        };

        zip.start_file(relative.as_str(), options)
            .map_err(|e| zip_failure(e, format!("Failed to add {relative}")))?;
        std::io::copy(&mut source, &mut zip).context(format!("Failed to archive {relative}"))?;
        count += 1;
    }

    let mut file = zip.finish().map_err(|e| zip_failure(e, "Failed to finalize snapshot".into()))?;
    file.flush().context("Failed to flush snapshot")?;
    file.sync_all().context("Failed to sync snapshot")?;

    debug!(entries = count, path = %dest.display(), "Snapshot container written");
    Ok(count)
}

/// Decodes the whole container, verifying every entry, without touching the
/// store.
///
/// `limit` bounds the total decompressed size across all entries.
fn decode_container(archive: Vec<u8>, limit: u64) -> Result<Vec<PendingEntry>, StorageError> {
    let mut zip = ZipArchive::new(Cursor::new(archive))
        .map_err(|e| StorageError::bad_archive(e.to_string()))?;

    let mut seen = BTreeSet::new();
    let mut entries = Vec::with_capacity(zip.len());
    let mut remaining = limit;

    for index in 0..zip.len() {
        let mut file = zip
            .by_index(index)
            .map_err(|e| StorageError::bad_archive(format!("Entry #{index}: {e}")))?;
        if file.is_dir() {
            continue;
        }

        let name = file.name().to_owned();
        let relative = security::normalize_relative(&name)?;
        if relative.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.contains(TMP_MARKER)) {
            warn!(entry = %name, "Skipping temp file entry");
            continue;
        }

        if file.size() > remaining {
            return Err(expansion_exceeded(limit));
        }

        let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0).min(64 * 1024 * 1024));
        // Declared sizes are untrusted; read one byte past the budget to detect lies.
        (&mut file)
            .take(remaining.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(|e| StorageError::bad_archive(format!("Entry {name:?}: {e}")))?;
        let decoded = data.len() as u64;
        if decoded > remaining {
            return Err(expansion_exceeded(limit));
        }
        remaining -= decoded;

        if !seen.insert(relative.clone()) {
            return Err(StorageError::bad_archive(format!("Duplicate entry {name:?}")));
        }
        entries.push(PendingEntry { relative, data });
    }

    // A file entry must not also be the folder of another entry.
    for path in &seen {
        if path.ancestors().skip(1).any(|ancestor| seen.contains(ancestor)) {
            return Err(StorageError::bad_archive(format!(
                "Entry {} is both a file and a folder",
                path.display()
            )));
        }
    }

    Ok(entries)
}

fn expansion_exceeded(limit: u64) -> StorageError {
    StorageError::BadArchive {
        message: format!("Archive expands beyond {limit} bytes").into(),
        context: Some("Restore size limit".into()),
    }
}

/// Rejects targets that collide with the existing tree: an entry landing on a
/// folder, or a folder segment that is an existing file.
async fn check_targets(root: &Path, targets: &[PathBuf]) -> Result<(), StorageError> {
    let conflict = |path: &Path, reason: &'static str| StorageError::Conflict {
        message: path.strip_prefix(root).unwrap_or(path).display().to_string().into(),
        context: Some(reason.into()),
    };

    for target in targets {
        if fs::symlink_metadata(target).await.is_ok_and(|m| m.is_dir()) {
            return Err(conflict(target, "Entry would replace an existing folder"));
        }
        for ancestor in target.ancestors().skip(1).take_while(|a| *a != root) {
            if fs::metadata(ancestor).await.is_ok_and(|m| !m.is_dir()) {
                return Err(conflict(ancestor, "Entry folder is an existing file"));
            }
        }
    }
    Ok(())
}

/// Removes every child of `root`, keeping `root` itself.
async fn clear_root(root: &Path) -> Result<(), StorageError> {
    let mut dir = fs::read_dir(root).await.context("Failed to read storage root")?;
    while let Some(entry) = dir.next_entry().await.context("Failed to read storage root")? {
        let path = entry.path();
        let is_dir = entry.file_type().await.context("Failed to inspect root entry")?.is_dir();
        let removed = if is_dir { fs::remove_dir_all(&path).await } else { fs::remove_file(&path).await };
        removed.context(format!("Failed to clear {}", path.display()))?;
    }
    Ok(())
}

async fn discard(temp: &Path) {
    if let Err(err) = fs::remove_file(temp).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %temp.display(), error = %err, "Failed to remove partial snapshot");
        }
    }
}
