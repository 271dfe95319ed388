//! Single and bulk deletion.

use crate::catalog::walk_files;
use crate::engine::{Storage, StoragePolicy};
use crate::error::StorageError;
use crate::naming;
use crate::security;
use crate::types::{DeleteFailure, DeleteReport};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

impl Storage {
    /// Removes the first regular file named `filename` found anywhere in the
    /// tree and returns its location relative to the root.
    ///
    /// The search is a linear walk; when several folders hold the same name,
    /// which one is removed follows walk order and is not stable across calls.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Containment`] for an unusable name and
    /// [`StorageError::NotFound`] if no such file exists.
    pub async fn delete_one(&self, filename: &str) -> Result<String, StorageError> {
        let filename = security::require_lookup(filename, "file name")?;
        let _gate = self.locks.shared().await;

        let root = self.root.clone();
        let wanted = filename.clone();
        let found = tokio::task::spawn_blocking(move || {
            walk_files(root)
                .filter_map(|entry| {
                    entry.inspect_err(|err| warn!(error = %err, "Skipping unreadable entry")).ok()
                })
                .find(|entry| entry.filename == wanted)
        })
        .await?;

        let Some(entry) = found else {
            return Err(StorageError::not_found(filename));
        };

        let _guard = self.locks.lock(&entry.path).await;
        match fs::remove_file(&entry.path).await {
            Ok(()) => {
                debug!(path = %entry.relative(), "File deleted");
                Ok(entry.relative())
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StorageError::not_found(filename)),
            Err(err) => Err(StorageError::Io {
                source: err,
                context: Some(format!("Failed to delete {}", entry.relative()).into()),
            }),
        }
    }

    /// Deletes every file whose extension is on the allow-list, then prunes
    /// empty folders bottom-up. Other files (markers, placeholders) survive.
    ///
    /// Holds the store exclusively for its duration. Per-file failures are
    /// collected into the report instead of aborting the batch; pruning
    /// failures are only logged.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the background task fails.
    pub async fn delete_all(&self) -> Result<DeleteReport, StorageError> {
        let _gate = self.locks.exclusive().await;

        let root = self.root.clone();
        let policy = self.policy.clone();
        let report =
            tokio::task::spawn_blocking(move || remove_allowed(&root, &policy, |path| std::fs::remove_file(path)))
                .await?;

        info!(deleted = report.deleted, failed = report.failures.len(), pruned = report.pruned, "Bulk delete finished");
        Ok(report)
    }
}

/// Deletes allow-listed files under `root` with `remove`, collecting per-file
/// failures, then prunes empty folders.
fn remove_allowed(
    root: &Path,
    policy: &StoragePolicy,
    remove: impl Fn(&Path) -> std::io::Result<()>,
) -> DeleteReport {
    let mut report = DeleteReport::default();

    for entry in walk_files(root.to_path_buf()) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                report.failures.push(DeleteFailure { path: String::new(), error: err.to_string() });
                continue;
            },
        };
        if !naming::extension_of(&entry.filename).is_some_and(|ext| policy.allows(&ext)) {
            continue;
        }

        match remove(&entry.path) {
            Ok(()) => report.deleted += 1,
            Err(err) => {
                warn!(path = %entry.relative(), error = %err, "Failed to delete file");
                report.failures.push(DeleteFailure { path: entry.relative(), error: err.to_string() });
            },
        }
    }

    report.pruned = prune_empty_dirs(root);
    report
}

/// Removes empty directories below `root` (never `root` itself), deepest
/// first. Returns how many were removed.
pub(crate) fn prune_empty_dirs(root: &Path) -> usize {
    let dirs: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_dir())
        .map(walkdir::DirEntry::into_path)
        .collect();

    dirs.iter()
        .filter(|dir| match std::fs::remove_dir(dir) {
            Ok(()) => true,
            Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => false,
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "Failed to prune folder");
                false
            },
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn pruning_keeps_root_and_non_empty_folders() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("a/b/c")).unwrap();
        std::fs::create_dir_all(root.join("keep")).unwrap();
        std::fs::write(root.join("keep/.gitkeep"), b"").unwrap();

        assert_eq!(prune_empty_dirs(root), 3);
        assert!(root.is_dir());
        assert!(!root.join("a").exists());
        assert!(root.join("keep/.gitkeep").exists());
    }

    #[test]
    fn failed_removals_are_reported_and_pruning_still_runs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        for folder in ["a", "b", "c"] {
            std::fs::create_dir_all(root.join(folder)).unwrap();
            std::fs::write(root.join(folder).join("x.png"), b"x").unwrap();
        }
        std::fs::write(root.join("c/notes.txt"), b"keep").unwrap();
        let policy = StoragePolicy {
            allowed_extensions: ["png".to_owned()].into_iter().collect(),
            max_file_size: 1024,
            default_folder: "default".to_owned(),
            max_restore_size: u64::MAX,
        };
        let blocked = root.join("b/x.png");

        let report = remove_allowed(root, &policy, |path| {
            if path == blocked {
                Err(std::io::Error::from(ErrorKind::PermissionDenied))
            } else {
                std::fs::remove_file(path)
            }
        });

        assert_eq!(report.deleted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "b/x.png");
        assert_eq!(report.pruned, 1);
        assert!(!root.join("a").exists());
        assert!(blocked.exists());
        assert!(root.join("c/notes.txt").exists());
    }
}
