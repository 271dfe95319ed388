use pixhost_domain::config::AppConfig;
use pixhost_storage::Storage;

/// Shared request state; both halves are cheap `Arc` clones.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub storage: Storage,
}
