//! Configuration resolution and graceful degradation tests
//!
//! Tests that manipulate EMBRYA_CONFIG are marked `#[serial]` so they do not
//! race on the process environment.

use embrya_common::config::{
    load_resolved_config, load_toml_config, resolve_config_path, TomlConfig,
};
use embrya_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;

const ENV_VAR: &str = "EMBRYA_CONFIG_TEST_PATH";

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_toml_config(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_full_file_parses() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
bind_address = "0.0.0.0"
port = 5800
model_dir = "/srv/embrya/models"
model_version = "ensemble-2025.1"
cors_origins = ["http://localhost:3000"]

[logging]
level = "embrya_ai=debug"
"#
    )
    .unwrap();

    let config = load_toml_config(file.path()).unwrap();
    assert_eq!(config.bind_address.as_deref(), Some("0.0.0.0"));
    assert_eq!(config.port, Some(5800));
    assert_eq!(config.model_dir, Some(PathBuf::from("/srv/embrya/models")));
    assert_eq!(config.model_version.as_deref(), Some("ensemble-2025.1"));
    assert_eq!(config.cors_origins, vec!["http://localhost:3000".to_string()]);
    assert_eq!(config.logging.level, "embrya_ai=debug");
}

#[test]
fn test_malformed_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number\"").unwrap();

    let result = load_toml_config(file.path());
    assert!(matches!(result, Err(Error::Toml(_))));
}

#[test]
fn test_port_zero_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = 0").unwrap();

    let result = load_toml_config(file.path());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    env::set_var(ENV_VAR, "/etc/embrya/from-env.toml");
    let path = resolve_config_path(None, ENV_VAR, "embrya-ai.toml");
    env::remove_var(ENV_VAR);

    assert_eq!(path, Some(PathBuf::from("/etc/embrya/from-env.toml")));
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    env::set_var(ENV_VAR, "/etc/embrya/from-env.toml");
    let cli = PathBuf::from("/opt/embrya/cli.toml");
    let path = resolve_config_path(Some(&cli), ENV_VAR, "embrya-ai.toml");
    env::remove_var(ENV_VAR);

    assert_eq!(path, Some(cli));
}

#[test]
#[serial]
fn test_resolved_missing_env_path_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    env::set_var(ENV_VAR, &missing);
    let config = load_resolved_config(None, ENV_VAR, "embrya-ai.toml");
    env::remove_var(ENV_VAR);

    assert_eq!(config.unwrap(), TomlConfig::default());
}
