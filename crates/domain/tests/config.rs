use pixhost_domain::config::{AppConfig, SecurityConfig, ServerConfig, StorageConfig};
use serde_json::json;
use std::path::PathBuf;

#[test]
fn config_defaults_are_sane() {
    let server = ServerConfig::default();
    assert_eq!(server.port, 5000);
    assert!(server.public_url.is_none());

    let security = SecurityConfig::default();
    assert!(security.api_keys.is_empty());
    assert_eq!(security.allowed_origins, vec!["*".to_owned()]);

    let storage = StorageConfig::default();
    assert_eq!(storage.max_file_size, 10 * 1024 * 1024);
    assert_eq!(storage.max_file_size_mb(), 10);
    assert_eq!(storage.default_folder, "default");
    assert!(storage.allowed_extensions.iter().any(|ext| ext == "webp"));
}

#[test]
fn app_config_deserializes_partial_documents() {
    let raw = json!({
        "server": { "port": 8080, "public_url": "https://img.example.com" },
        "security": { "api_keys": ["k1", "k2"] },
        "storage": { "root": "/srv/images", "max_file_size": 1024 }
    });

    let cfg: AppConfig = serde_json::from_value(raw).expect("config deserialize");
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.server.public_url.as_deref(), Some("https://img.example.com"));
    assert_eq!(cfg.security.api_keys.len(), 2);
    assert_eq!(cfg.security.allowed_origins, vec!["*".to_owned()]);
    assert_eq!(cfg.storage.root, PathBuf::from("/srv/images"));
    assert_eq!(cfg.storage.max_file_size, 1024);
    assert_eq!(cfg.storage.default_folder, "default");
    assert_eq!(cfg.logging.level, "info");
}

#[test]
fn extensions_are_normalized() {
    let storage = StorageConfig {
        allowed_extensions: vec![".PNG".to_owned(), " jpg ".to_owned(), String::new()],
        ..StorageConfig::default()
    };

    assert_eq!(storage.normalized_extensions(), vec!["png".to_owned(), "jpg".to_owned()]);
}

#[test]
fn config_mutation_does_not_leak_into_clones() {
    let original = AppConfig::default();
    let mut changed = original.clone();
    changed.server.port = 9000;

    assert_eq!(original.server.port, 5000);
    assert_eq!(changed.server.port, 9000);
}
