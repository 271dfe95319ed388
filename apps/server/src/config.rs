use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default configuration file stem; any format the `config` crate detects.
pub const DEFAULT_CONFIG_PATH: &str = "config/pixhost";
/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "PIXHOST_CONFIG";
const ENV_PREFIX: &str = "PIXHOST";

#[pixhost_derive::pixhost_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Loads configuration from an optional file overlaid with environment
/// variables.
///
/// 1. **File**: `path`, else `$PIXHOST_CONFIG`, else `config/pixhost`. A
///    missing file is not an error; every field has a default.
/// 2. **Environment**: variables prefixed with `PIXHOST__`, nested with
///    double underscores (`PIXHOST__STORAGE__MAX_FILE_SIZE=1048576` maps to
///    `storage.max_file_size`). List values are comma separated.
///
/// # Errors
///
/// Returns [`ConfigError::Config`] if the file is malformed or a value
/// cannot be deserialized into `T`.
///
/// # Example
///
/// ```rust
/// use pixhost_server::config::load_config;
/// use pixhost_domain::config::AppConfig;
///
/// let cfg: AppConfig = load_config(Some("does/not/exist")).unwrap();
/// assert_eq!(cfg.storage.default_folder, "default");
/// ```
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let effective_path = path.map_or_else(
        || std::env::var_os(CONFIG_PATH_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from),
        |p| p.as_ref().to_path_buf(),
    );

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("security.api_keys")
                .with_list_parse_key("security.allowed_origins")
                .with_list_parse_key("storage.allowed_extensions")
                .try_parsing(true),
        );

    info!("Loading config from {}", effective_path.display());

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixhost_domain::config::AppConfig;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn missing_file_yields_defaults() {
        let cfg: AppConfig = load_config(Some("definitely/missing/pixhost")).unwrap();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.storage.default_folder, "default");
    }

    #[test]
    #[serial]
    fn file_values_are_applied() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pixhost.toml");
        std::fs::write(
            &path,
            "[server]\nport = 8080\n\n[storage]\nroot = \"/srv/images\"\nallowed_extensions = [\"png\"]\n",
        )
        .unwrap();

        let cfg: AppConfig = load_config(Some(&path)).unwrap();

        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.storage.root, PathBuf::from("/srv/images"));
        assert_eq!(cfg.storage.allowed_extensions, vec!["png".to_owned()]);
    }

    #[test]
    #[serial]
    fn malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = load_config::<AppConfig>(Some(&path)).unwrap_err();
        assert_eq!(err.code(), "config");
    }
}
