//! Tests for [`ClientSettings`].

use super::*;
use std::fs;

fn environment(vars: &[(&str, &str)]) -> config::Environment {
    let mut source = config::Map::new();
    for (key, value) in vars {
        source.insert(key.to_string(), value.to_string());
    }

    config::Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .source(Some(source))
}

#[test]
fn test_defaults_match_client_config() {
    let settings = ClientSettings::default();
    let client = ClientConfig::default();

    assert_eq!(settings.to_client_config(), client);
    assert_eq!(settings.default_visibility_timeout, 30);
    assert_eq!(settings.default_max_batch, 10);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_load_without_sources_yields_defaults() {
    let settings = ClientSettings::load_with_environment(None, environment(&[])).unwrap();
    assert_eq!(settings, ClientSettings::default());
}

/// Verify a settings file overrides defaults and leaves other fields alone.
#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.toml");
    fs::write(
        &path,
        "base_url = \"http://broker.internal:9000\"\ntimeout_seconds = 5\n",
    )
    .unwrap();

    let settings = ClientSettings::load_with_environment(Some(&path), environment(&[])).unwrap();

    assert_eq!(settings.base_url, "http://broker.internal:9000");
    assert_eq!(settings.timeout_seconds, 5);
    assert!(settings.validate_routing);
    assert_eq!(
        settings.to_client_config().timeout,
        Duration::from_secs(5)
    );
}

#[test]
fn test_environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.toml");
    fs::write(&path, "base_url = \"http://from-file:9000\"\n").unwrap();

    let settings = ClientSettings::load_with_environment(
        Some(&path),
        environment(&[
            ("RQS__BASE_URL", "http://from-env:9000"),
            ("RQS__VALIDATE_ROUTING", "false"),
            ("RQS__DEFAULT_MAX_BATCH", "25"),
        ]),
    )
    .unwrap();

    assert_eq!(settings.base_url, "http://from-env:9000");
    assert!(!settings.validate_routing);
    assert_eq!(settings.default_max_batch, 25);
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let result = ClientSettings::load_with_environment(Some(&path), environment(&[]));
    assert!(matches!(result, Err(ConfigurationError::Parsing(_))));
}

#[test]
fn test_invalid_values_are_rejected() {
    let result = ClientSettings::load_with_environment(
        None,
        environment(&[("RQS__TIMEOUT_SECONDS", "0")]),
    );
    assert!(matches!(result, Err(ConfigurationError::Invalid { .. })));

    let settings = ClientSettings {
        base_url: " ".to_string(),
        ..ClientSettings::default()
    };
    assert!(settings.validate().is_err());

    let settings = ClientSettings {
        default_max_batch: 0,
        ..ClientSettings::default()
    };
    assert!(settings.validate().is_err());
}
