use crate::engine::{Storage, StorageInner, StoragePolicy};
use crate::error::{StorageError, StorageErrorExt};
use crate::locks::PathLocks;
use crate::security;
use crate::transform::Transform;
use private::Sealed;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::fs;
use tracing::info;

const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_RESTORE_SIZE: u64 = 4 * 1024 * 1024 * 1024;
const DEFAULT_FOLDER: &str = "default";
const DEFAULT_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "bmp"];

#[derive(Debug, Clone)]
struct BuilderConfig {
    create: bool,
    allowed_extensions: Vec<String>,
    max_file_size: u64,
    max_restore_size: u64,
    default_folder: String,
    snapshot_dir: Option<PathBuf>,
    transform: Option<Arc<dyn Transform>>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            create: true,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|&e| e.to_owned()).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_restore_size: DEFAULT_MAX_RESTORE_SIZE,
            default_folder: DEFAULT_FOLDER.to_owned(),
            snapshot_dir: None,
            transform: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

/// Typestate builder for [`Storage`]; `.root(..)` must be called before `.connect()`.
#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct StorageBuilder<S: Sealed = NoRoot> {
    state: S,
    config: BuilderConfig,
}

#[allow(private_bounds)]
impl<S: Sealed> StorageBuilder<S> {
    #[must_use = "Sets whether missing directories are created on connect"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.config.create = enable;
        self
    }

    /// Replaces the extension allow-list. Entries are lower-cased and leading
    /// dots are stripped.
    #[must_use = "Sets the extension allow-list"]
    pub fn allowed_extensions<I, E>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: AsRef<str>,
    {
        self.config.allowed_extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    #[must_use = "Sets the maximum accepted upload size in bytes"]
    pub const fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    /// Caps the total decompressed size of a snapshot accepted by restore.
    #[must_use = "Sets the restore expansion limit in bytes"]
    pub const fn max_restore_size(mut self, bytes: u64) -> Self {
        self.config.max_restore_size = bytes;
        self
    }

    #[must_use = "Sets the folder used when an upload names none"]
    pub fn default_folder(mut self, folder: impl Into<String>) -> Self {
        self.config.default_folder = folder.into();
        self
    }

    #[must_use = "Sets the directory receiving snapshot containers"]
    pub fn snapshot_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_dir = Some(path.into());
        self
    }

    #[must_use = "Sets the transform applied to uploads flagged for optimization"]
    pub fn transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.config.transform = Some(transform);
        self
    }

    fn transition<N: Sealed>(self, state: N) -> StorageBuilder<N> {
        StorageBuilder { state, config: self.config }
    }
}

impl StorageBuilder<NoRoot> {
    #[must_use = "Creates a new storage builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the root directory of the store"]
    pub fn root(self, path: impl Into<PathBuf>) -> StorageBuilder<WithRoot> {
        self.transition(WithRoot(path.into()))
    }
}

impl StorageBuilder<WithRoot> {
    /// Consumes the configuration and initializes the store.
    ///
    /// Boot sequence:
    /// 1. **Bootstrapping**: creates the root and snapshot directories when
    ///    `create(true)` (the default).
    /// 2. **Canonicalization**: resolves both to physical paths; containment
    ///    checks compare against these.
    /// 3. **Validation**: rejects a snapshot directory inside the root, an
    ///    empty allow-list and a default folder that sanitizes to nothing.
    /// 4. **Self-Healing**: removes stale temp files left by interrupted
    ///    writes in both directories. Failures there are logged, never fatal.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if a directory is missing (with
    /// `create(false)`) or cannot be created or resolved, and
    /// [`StorageError::Internal`] for an inconsistent configuration.
    pub async fn connect(self) -> Result<Storage, StorageError> {
        let root = &self.state.0;
        let snapshot_dir = self.config.snapshot_dir.clone().unwrap_or_else(|| sibling_dir(root));

        if self.config.create {
            for dir in [root, &snapshot_dir] {
                fs::create_dir_all(dir)
                    .await
                    .context(format!("Failed to bootstrap directory: {}", dir.display()))?;
            }
            info!(root = %root.display(), snapshots = %snapshot_dir.display(), "Bootstrapped storage directories");
        }

        let root = fs::canonicalize(root)
            .await
            .context(format!("Failed to resolve storage root: {}", root.display()))?;
        let snapshot_dir = fs::canonicalize(&snapshot_dir)
            .await
            .context(format!("Failed to resolve snapshot directory: {}", snapshot_dir.display()))?;

        if snapshot_dir.starts_with(&root) {
            return Err(StorageError::Internal {
                message: snapshot_dir.display().to_string().into(),
                context: Some("Snapshot directory must not live inside the storage root".into()),
            });
        }
        if self.config.allowed_extensions.is_empty() {
            return Err("Extension allow-list is empty".into());
        }
        let default_folder = security::sanitize_component(&self.config.default_folder);
        if default_folder.is_empty() {
            return Err(StorageError::Internal {
                message: self.config.default_folder.clone().into(),
                context: Some("Default folder is empty after sanitization".into()),
            });
        }

        let storage = Storage {
            inner: Arc::new(StorageInner {
                root,
                snapshot_dir,
                policy: StoragePolicy {
                    allowed_extensions: self.config.allowed_extensions.into_iter().collect(),
                    max_file_size: self.config.max_file_size,
                    default_folder,
                    max_restore_size: self.config.max_restore_size,
                },
                transform: self.config.transform.unwrap_or_else(default_transform),
                locks: PathLocks::new(),
                tmp_counter: AtomicU64::new(1),
            }),
        };

        storage.purge_tmp().await;

        Ok(storage)
    }
}

/// `<parent>/<root-name>-snapshots`, next to the root.
fn sibling_dir(root: &Path) -> PathBuf {
    let name = root.file_name().and_then(|n| n.to_str()).unwrap_or("pixhost");
    root.with_file_name(format!("{name}-snapshots"))
}

#[cfg(feature = "optimizer")]
fn default_transform() -> Arc<dyn Transform> {
    Arc::new(crate::transform::ImageOptimizer::default())
}

#[cfg(not(feature = "optimizer"))]
fn default_transform() -> Arc<dyn Transform> {
    Arc::new(crate::transform::Passthrough)
}
