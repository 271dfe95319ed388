use chrono::{DateTime, Utc};
use serde::Serialize;

/// Folder/filename pair addressing one stored object.
///
/// An empty `folder` denotes the root level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub folder: String,
    pub filename: String,
}

impl Location {
    /// Path relative to the root, `/`-separated, suitable for building
    /// `/image/<folder>/<filename>` URLs.
    #[must_use]
    pub fn relative(&self) -> String {
        if self.folder.is_empty() {
            self.filename.clone()
        } else {
            format!("{}/{}", self.folder, self.filename)
        }
    }
}

/// Descriptor of one persisted file as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub filename: String,
    /// Relative directory, `/`-separated; empty at the root level.
    pub folder: String,
    pub size: u64,
    /// Lower-case hex SHA-256 of the stored bytes.
    pub digest: String,
    pub modified: DateTime<Utc>,
}

impl StoredObject {
    #[must_use]
    pub fn location(&self) -> Location {
        Location { folder: self.folder.clone(), filename: self.filename.clone() }
    }
}

/// An incoming upload, fully buffered.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub original_name: String,
    pub folder: Option<String>,
    pub optimize: bool,
    pub content_type: Option<String>,
}

impl UploadRequest {
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>, original_name: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            original_name: original_name.into(),
            folder: None,
            optimize: false,
            content_type: None,
        }
    }

    #[must_use]
    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    #[must_use]
    pub const fn optimize(mut self, enable: bool) -> Self {
        self.optimize = enable;
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Whether the declared content type names an image.
    pub(crate) fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub filename: String,
    pub folder: String,
    pub size: u64,
    pub digest: String,
    pub uploaded_at: DateTime<Utc>,
    /// `false` when optimization was requested but the original bytes were kept.
    pub optimized: bool,
}

impl UploadReceipt {
    #[must_use]
    pub fn location(&self) -> Location {
        Location { folder: self.folder.clone(), filename: self.filename.clone() }
    }
}

/// A file that could not be removed during a bulk delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    /// Path relative to the root.
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub deleted: usize,
    pub failures: Vec<DeleteFailure>,
    /// Empty folders removed after the deletions.
    pub pruned: usize,
}

/// A snapshot container in the snapshot directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub id: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    /// Handle accepted by [`Storage::read_snapshot`](crate::Storage::read_snapshot).
    pub reference: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub restored: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_omits_empty_folder() {
        let top = Location { folder: String::new(), filename: "a.png".into() };
        let nested = Location { folder: "cats".into(), filename: "a.png".into() };
        assert_eq!(top.relative(), "a.png");
        assert_eq!(nested.relative(), "cats/a.png");
    }

    #[test]
    fn image_content_types_are_detected() {
        let req = UploadRequest::new(vec![], "a.png");
        assert!(!req.is_image());
        assert!(req.clone().content_type("Image/PNG").is_image());
        assert!(!req.content_type("application/octet-stream").is_image());
    }
}
