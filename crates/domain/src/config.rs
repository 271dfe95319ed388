use crate::constants::MIB;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level service configuration.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfigInner {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Thin Arc-wrapped config for inexpensive cloning into request handlers.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(flatten, default)]
    inner: Arc<AppConfigInner>,
}

impl Deref for AppConfig {
    type Target = AppConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for AppConfig {
    fn deref_mut(&mut self) -> &mut AppConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    /// Base address used when building retrieval URLs. Derived from the
    /// request `Host` header when absent.
    pub public_url: Option<String>,
}

/// Shared-secret and cross-origin settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Accepted API keys. An empty list disables the check entirely.
    pub api_keys: Vec<String>,
    pub allowed_origins: Vec<String>,
}

/// Storage root and upload policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub snapshot_dir: PathBuf,
    pub allowed_extensions: Vec<String>,
    pub max_file_size: u64,
    pub max_archive_size: u64,
    pub default_folder: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for rolling log files; console only when unset.
    pub directory: Option<PathBuf>,
    pub json: bool,
}

impl StorageConfig {
    /// Allowed extensions, lower-cased and without leading dots.
    #[must_use]
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }

    #[must_use]
    pub const fn max_file_size_mb(&self) -> u64 {
        self.max_file_size / MIB
    }
}

// --- Default ---

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 5000, public_url: None }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { api_keys: Vec::new(), allowed_origins: vec!["*".to_owned()] }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("uploads"),
            snapshot_dir: PathBuf::from("backups"),
            allowed_extensions: ["png", "jpg", "jpeg", "gif", "webp", "bmp"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            max_file_size: 10 * MIB,
            max_archive_size: 512 * MIB,
            default_folder: "default".to_owned(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), directory: None, json: false }
    }
}
