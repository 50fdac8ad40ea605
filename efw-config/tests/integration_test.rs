//! Integration tests for efw-config

use efw_config::*;
use std::env;
use std::io::Write;

#[test]
fn test_load_properties_file() {
    let mut file = tempfile::Builder::new().suffix(".properties").tempfile().unwrap();
    writeln!(file, "efw.jdbc.resource=jdbc/app").unwrap();
    writeln!(file, "efw.jdbc.resource.url=jdbc:h2:mem:app").unwrap();
    writeln!(file, "efw.jdbc.resource.1=jdbc/report").unwrap();

    let manager = ConfigManager::new();
    manager.load_file_auto(file.path()).unwrap();

    assert_eq!(manager.property(keys::JDBC_RESOURCE).as_deref(), Some("jdbc/app"));
    assert_eq!(
        manager.property(&keys::indexed(keys::JDBC_RESOURCE, 1)).as_deref(),
        Some("jdbc/report")
    );
    assert_eq!(manager.property(&keys::indexed(keys::JDBC_RESOURCE, 2)), None);
}

#[test]
fn test_later_file_overrides_earlier() {
    let mut base = tempfile::Builder::new().suffix(".properties").tempfile().unwrap();
    writeln!(base, "efw.jdbc.resource=jdbc/base").unwrap();
    let mut overlay = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    writeln!(overlay, r#"{{"efw.jdbc.resource": "jdbc/overlay"}}"#).unwrap();

    let manager = ConfigManager::new();
    manager.load_file(base.path(), FileFormat::Properties).unwrap();
    manager.load_file(overlay.path(), FileFormat::Json).unwrap();

    assert_eq!(manager.property(keys::JDBC_RESOURCE).as_deref(), Some("jdbc/overlay"));
}

#[test]
fn test_missing_file_is_load_error() {
    let manager = ConfigManager::new();
    let err = manager
        .load_file("/nonexistent/efw.properties", FileFormat::Properties)
        .unwrap_err();
    assert!(matches!(err, ConfigError::LoadError(_)));
}

#[test]
fn test_env_with_prefix() {
    unsafe {
        env::set_var("EFWITEST_JDBC_RESOURCE", "jdbc/from-env");
    }

    let manager = ConfigManager::with_prefix("EFWITEST");
    manager.load_env().unwrap();
    assert_eq!(
        manager.property("efwitest.jdbc.resource").as_deref(),
        Some("jdbc/from-env")
    );

    // Keys returned by `load` read back through `load_var`.
    let loader = EnvLoader::new(Some("EFWITEST".to_string()));
    let loaded = loader.load().unwrap();
    assert_eq!(loaded["efwitest.jdbc.resource"], "jdbc/from-env");
    for (key, value) in &loaded {
        assert_eq!(&loader.load_var(key).unwrap(), value);
    }
    assert!(loader.load_var("jdbc.resource").is_err());

    unsafe {
        env::remove_var("EFWITEST_JDBC_RESOURCE");
    }
}

#[test]
fn test_config_error_display() {
    let err = ConfigError::KeyNotFound("efw.jdbc.resource".to_string());
    assert!(err.to_string().contains("efw.jdbc.resource"));
}
