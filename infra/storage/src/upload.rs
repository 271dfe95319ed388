//! Upload pipeline: validate, optionally transform, persist, describe.

use crate::catalog::digest;
use crate::engine::Storage;
use crate::error::StorageError;
use crate::naming;
use crate::security;
use crate::types::{UploadReceipt, UploadRequest};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

impl Storage {
    /// Persists one upload under a freshly generated name.
    ///
    /// Validation (extension, size, names) happens before anything touches
    /// the disk. When `optimize` is set and the declared content type is an
    /// image, the configured [`Transform`](crate::Transform) runs on the
    /// blocking pool; if it fails the original bytes are stored instead.
    ///
    /// # Errors
    ///
    /// - [`StorageError::UnsupportedType`] if the original name has no
    ///   extension or it is not on the allow-list.
    /// - [`StorageError::SizeLimit`] if the payload exceeds the maximum.
    /// - [`StorageError::Containment`] if the destination cannot be resolved
    ///   under the root.
    /// - [`StorageError::Io`] if the write fails; nothing is left behind.
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, StorageError> {
        let Some(extension) = naming::extension_of(&request.original_name) else {
            return Err(StorageError::UnsupportedType {
                message: request.original_name.into(),
                context: Some("File name has no extension".into()),
            });
        };
        if !self.policy.allows(&extension) {
            return Err(StorageError::UnsupportedType {
                message: extension.into(),
                context: Some(format!("Allowed: {}", self.policy.allowed_extensions().join(", ")).into()),
            });
        }

        let size = request.bytes.len() as u64;
        if size > self.policy.max_file_size {
            return Err(StorageError::SizeLimit {
                message: format!("{size} bytes").into(),
                context: Some(format!("Maximum is {} bytes", self.policy.max_file_size).into()),
            });
        }

        let folder = security::folder_or_default(request.folder.as_deref(), &self.policy.default_folder);
        let filename = naming::generate(&request.original_name);

        let _gate = self.locks.shared().await;
        let resolved = security::resolve(&self.root, &folder, &filename)?;

        let wants_transform = request.optimize && request.is_image();
        let (bytes, optimized) = if wants_transform {
            self.apply_transform(request.bytes).await
        } else {
            (request.bytes, false)
        };

        let _guard = self.locks.lock(&resolved).await;
        self.write_atomic(&resolved, &bytes).await?;

        debug!(folder = %folder, filename = %filename, size = bytes.len(), optimized, "Upload stored");

        Ok(UploadReceipt {
            size: bytes.len() as u64,
            digest: digest(&bytes),
            filename,
            folder,
            uploaded_at: Utc::now(),
            optimized,
        })
    }

    /// Runs the transform, returning the original bytes on any failure.
    async fn apply_transform(&self, original: Vec<u8>) -> (Vec<u8>, bool) {
        let transform = Arc::clone(&self.transform);
        let input = Arc::new(original);
        let task_input = Arc::clone(&input);

        let outcome = tokio::task::spawn_blocking(move || transform.transform(&task_input)).await;
        let original = Arc::try_unwrap(input).unwrap_or_else(|shared| (*shared).clone());

        match outcome {
            Ok(Ok(transformed)) => (transformed, true),
            Ok(Err(err)) => {
                warn!(error = %err, "Transform failed, keeping original bytes");
                (original, false)
            },
            Err(err) => {
                warn!(error = %err, "Transform task failed, keeping original bytes");
                (original, false)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::transform::{Transform, TransformError};
    use crate::{Storage, UploadRequest};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct Failing;

    impl Transform for Failing {
        fn transform(&self, _: &[u8]) -> Result<Vec<u8>, TransformError> {
            Err(TransformError::Unprocessable { message: "boom".into(), context: None })
        }
    }

    #[derive(Debug)]
    struct Reverse;

    impl Transform for Reverse {
        fn transform(&self, bytes: &[u8]) -> Result<Vec<u8>, TransformError> {
            Ok(bytes.iter().rev().copied().collect())
        }
    }

    async fn storage_with(tmp: &TempDir, transform: Arc<dyn Transform>) -> Storage {
        Storage::builder()
            .root(tmp.path().join("root"))
            .snapshot_dir(tmp.path().join("snapshots"))
            .transform(transform)
            .connect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn failing_transform_keeps_original_bytes() {
        let tmp = TempDir::new().unwrap();
        let storage = storage_with(&tmp, Arc::new(Failing)).await;

        let receipt = storage
            .upload(UploadRequest::new(b"not really a png".to_vec(), "x.png").optimize(true).content_type("image/png"))
            .await
            .unwrap();

        assert!(!receipt.optimized);
        assert_eq!(storage.read(&receipt.folder, &receipt.filename).await.unwrap(), b"not really a png");
    }

    #[tokio::test]
    async fn transform_runs_only_for_images() {
        let tmp = TempDir::new().unwrap();
        let storage = storage_with(&tmp, Arc::new(Reverse)).await;

        let skipped = storage
            .upload(UploadRequest::new(b"abc".to_vec(), "x.png").optimize(true).content_type("text/plain"))
            .await
            .unwrap();
        let applied = storage
            .upload(UploadRequest::new(b"abc".to_vec(), "x.png").optimize(true).content_type("image/png"))
            .await
            .unwrap();

        assert_eq!(storage.read(&skipped.folder, &skipped.filename).await.unwrap(), b"abc");
        assert_eq!(storage.read(&applied.folder, &applied.filename).await.unwrap(), b"cba");
        assert_eq!(applied.digest, crate::catalog::digest(b"cba"));
    }

    #[tokio::test]
    async fn validation_happens_before_any_write() {
        let tmp = TempDir::new().unwrap();
        let storage = Storage::builder()
            .root(tmp.path().join("root"))
            .snapshot_dir(tmp.path().join("snapshots"))
            .max_file_size(4)
            .connect()
            .await
            .unwrap();

        let no_ext = storage.upload(UploadRequest::new(vec![1], "README")).await.unwrap_err();
        let bad_ext = storage.upload(UploadRequest::new(vec![1], "run.exe")).await.unwrap_err();
        let too_big = storage.upload(UploadRequest::new(vec![0; 5], "a.png")).await.unwrap_err();

        assert_eq!(no_ext.code(), "unsupported_type");
        assert_eq!(bad_ext.code(), "unsupported_type");
        assert_eq!(too_big.code(), "size_limit");
        assert!(too_big.is_validation());
        assert_eq!(std::fs::read_dir(storage.root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn hostile_folder_is_neutralized() {
        let tmp = TempDir::new().unwrap();
        let storage = storage_with(&tmp, Arc::new(crate::Passthrough)).await;

        let dotted = storage.upload(UploadRequest::new(vec![1], "a.png").folder("../../etc")).await.unwrap();
        let empty = storage.upload(UploadRequest::new(vec![1], "a.png").folder("..")).await.unwrap();

        assert_eq!(dotted.folder, "etc");
        assert_eq!(empty.folder, "default");
        assert!(storage.root().join("etc").join(&dotted.filename).is_file());
    }
}
