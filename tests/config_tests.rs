//! Configuration file loading

use murkylook::config::AppConfig;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = write_config(
        r#"
server:
  port: 8088
  graphql_path: /api/graphql
  cors_origins:
    - https://app.example
database:
  url: postgres://travel:secret@db:5432/travel
  max_connections: 8
loader:
  delay_ms: 3
  max_batch_size: 250
"#,
    );

    let config = AppConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.server.port, 8088);
    assert_eq!(config.server.graphql_path, "/api/graphql");
    assert_eq!(config.server.cors_origins, vec!["https://app.example"]);
    assert_eq!(
        config.database.url.as_deref(),
        Some("postgres://travel:secret@db:5432/travel")
    );
    assert_eq!(config.database.max_connections, 8);

    let options = config.loader.options();
    assert_eq!(options.delay, Duration::from_millis(3));
    assert_eq!(options.max_batch_size, Some(250));
}

#[test]
fn test_shipped_default_config_is_valid() {
    let config =
        AppConfig::from_yaml_file(concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.yaml"))
            .unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.server.bind_address(), "0.0.0.0:4000");
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(AppConfig::from_yaml_file("/nonexistent/murkylook.yaml").is_err());
}

#[test]
fn test_malformed_yaml_is_an_error() {
    let file = write_config("server: [not, a, map");
    assert!(AppConfig::from_yaml_file(file.path().to_str().unwrap()).is_err());
}

#[test]
fn test_invalid_values_fail_validation() {
    let file = write_config("server:\n  graphql_path: graphql\n");
    let config = AppConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();
    assert!(config.validate().is_err());

    let file = write_config("loader:\n  max_batch_size: 0\n");
    let config = AppConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();
    assert!(config.validate().is_err());
}
