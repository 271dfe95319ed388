//! Sandboxed media store.
//!
//! Turns untrusted client-supplied names into safe, collision-free paths under
//! a single root, and provides listing, relocation, bulk removal and ZIP
//! snapshots on top of that guarantee. All examples use temporary directories.
//!
//! # Core Features
//!
//! - **Containment**: every folder and file name is sanitized as an isolated
//!   component, then the joined path is re-resolved physically so symlinks
//!   inside the root cannot redirect I/O outside of it.
//! - **Atomic Writes**: unique temp file + `fsync` + `rename`; readers never
//!   see a truncated object.
//! - **Collision-free Names**: `<timestamp>_<uuid-v4>.<ext>`, no tree lookups.
//! - **Per-path Locking**: check-then-act sequences (upload, move, delete) are
//!   serialized per resolved path; bulk operations hold the whole store.
//! - **Snapshots**: full-fidelity ZIP backups, verified end to end before a
//!   restore touches the store.
//! - **Self-Healing**: stale temp files from interrupted writes are purged on
//!   connect.
//!
//! # Examples
//!
//! ```rust
//! use pixhost_storage::{Storage, StorageError, UploadRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StorageError> {
//!     # let tmp = tempfile::tempdir().unwrap();
//!     let storage = Storage::builder()
//!         .root(tmp.path().join("uploads"))
//!         .snapshot_dir(tmp.path().join("backups"))
//!         .allowed_extensions(["png", "jpg"])
//!         .max_file_size(1024 * 1024)
//!         .connect()
//!         .await?;
//!
//!     let receipt = storage
//!         .upload(UploadRequest::new(b"\x89PNG...".to_vec(), "photo.PNG").folder("avatars"))
//!         .await?;
//!     assert_eq!(receipt.folder, "avatars");
//!
//!     let moved = storage.move_file(&receipt.filename, "avatars", "archive").await?;
//!     assert_eq!(moved.relative(), format!("archive/{}", receipt.filename));
//!
//!     let snapshot = storage.create_snapshot().await?;
//!     let report = storage.delete_all().await?;
//!     assert_eq!(report.deleted, 1);
//!
//!     let archive = storage.read_snapshot(&snapshot.id).await?;
//!     let restored = storage.restore_snapshot(archive, true).await?;
//!     assert_eq!(restored.restored, 1);
//!     Ok(())
//! }
//! ```

mod archive;
mod builder;
mod catalog;
mod engine;
mod error;
mod locks;
mod maintenance;
pub mod naming;
mod reorganize;
mod remover;
pub mod security;
mod transform;
mod types;
mod upload;

pub use builder::{NoRoot, StorageBuilder, WithRoot};
pub use catalog::{Catalog, digest};
pub use engine::{Storage, StorageInner, StoragePolicy};
pub use error::{StorageError, StorageErrorExt};
#[cfg(feature = "optimizer")]
pub use transform::ImageOptimizer;
pub use transform::{Passthrough, Transform, TransformError, TransformErrorExt};
pub use types::{
    DeleteFailure, DeleteReport, Location, RestoreReport, SnapshotInfo, StoredObject, UploadReceipt,
    UploadRequest,
};
