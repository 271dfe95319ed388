//! Relocation of stored objects between folders.

use crate::engine::{Storage, is_tmp_name};
use crate::error::{StorageError, StorageErrorExt};
use crate::security;
use crate::types::Location;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

impl Storage {
    /// Moves `filename` from `source_folder` to `target_folder`, keeping its
    /// name. The source is looked up by its existing name; the target folder is
    /// sanitized. An empty folder addresses the root level.
    ///
    /// Both paths stay locked for the whole check-and-rename, and an existing
    /// target is never overwritten. Across filesystems the object is copied
    /// (atomically) and the source removed afterwards.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Containment`] for unusable names.
    /// - [`StorageError::NotFound`] if the source is not a stored file.
    /// - [`StorageError::Conflict`] if the target already exists.
    /// - [`StorageError::Io`] if the filesystem operation fails.
    pub async fn move_file(
        &self,
        filename: &str,
        source_folder: &str,
        target_folder: &str,
    ) -> Result<Location, StorageError> {
        let filename = security::require_lookup(filename, "file name")?;
        let source_folder = security::lookup_component(source_folder);
        let target_folder = security::sanitize_component(target_folder);

        let _gate = self.locks.shared().await;
        let source = security::resolve(&self.root, &source_folder, &filename)?;
        let target = security::resolve(&self.root, &target_folder, &filename)?;
        let _guards = self.locks.lock_pair(&source, &target).await;

        if is_tmp_name(&source) || !is_regular_file(&source).await {
            return Err(StorageError::not_found(format!("{source_folder}/{filename}")));
        }
        if fs::symlink_metadata(&target).await.is_ok() {
            return Err(StorageError::Conflict {
                message: format!("{target_folder}/{filename}").into(),
                context: Some("Moves never overwrite".into()),
            });
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create folder {target_folder:?}"))?;
        }

        match fs::rename(&source, &target).await {
            Ok(()) => {},
            Err(err) if err.kind() == ErrorKind::CrossesDevices => {
                info!(source = %source.display(), target = %target.display(), "Falling back to copy for cross-device move");
                self.copy_then_remove(&source, &target).await?;
            },
            Err(err) => {
                return Err(StorageError::Io {
                    source: err,
                    context: Some(format!("Move failed: {} -> {}", source.display(), target.display()).into()),
                });
            },
        }

        debug!(filename = %filename, from = %source_folder, to = %target_folder, "File moved");
        Ok(Location { folder: target_folder, filename })
    }

    async fn copy_then_remove(&self, source: &Path, target: &Path) -> Result<(), StorageError> {
        let data = fs::read(source).await.context(format!("Failed to read {}", source.display()))?;
        self.write_atomic(target, &data).await?;
        fs::remove_file(source)
            .await
            .context(format!("Copied, but failed to remove source {}", source.display()))
    }
}

async fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok_and(|m| m.is_file())
}

#[cfg(test)]
mod tests {
    use crate::{Storage, UploadRequest};
    use tempfile::TempDir;

    async fn storage(tmp: &TempDir) -> Storage {
        Storage::builder()
            .root(tmp.path().join("root"))
            .snapshot_dir(tmp.path().join("snapshots"))
            .connect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn move_to_root_level_and_back() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp).await;
        let receipt = storage.upload(UploadRequest::new(vec![7; 10], "a.gif").folder("gifs")).await.unwrap();

        let top = storage.move_file(&receipt.filename, "gifs", "").await.unwrap();
        assert_eq!(top.folder, "");
        assert!(storage.root().join(&receipt.filename).is_file());

        let back = storage.move_file(&receipt.filename, "", "gifs").await.unwrap();
        assert_eq!(back.folder, "gifs");
        assert_eq!(storage.read("gifs", &receipt.filename).await.unwrap(), vec![7; 10]);
    }

    #[tokio::test]
    async fn missing_source_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp).await;

        let err = storage.move_file("ghost.png", "a", "b").await.unwrap_err();
        assert_eq!(err.code(), "not_found");
        assert!(!storage.root().join("b").exists());
    }

    #[tokio::test]
    async fn directories_cannot_be_moved() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp).await;
        std::fs::create_dir_all(storage.root().join("cats")).unwrap();

        let err = storage.move_file("cats", "", "dogs").await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn same_folder_is_a_conflict() {
        let tmp = TempDir::new().unwrap();
        let storage = storage(&tmp).await;
        let receipt = storage.upload(UploadRequest::new(vec![1], "a.png")).await.unwrap();

        let err = storage.move_file(&receipt.filename, "default", "default").await.unwrap_err();
        assert_eq!(err.code(), "conflict");
        assert!(storage.root().join("default").join(&receipt.filename).is_file());
    }
}
