//! Integration tests for the config crate

use ctrl_ha_config::{validate_config, AppConfig, ConfigError, ConfigLoader};
use ctrl_ha_types::ApiAccessMode;
use std::io::Write;
use std::path::PathBuf;

fn repo_config(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../config")
        .join(name)
}

#[test]
fn test_load_default_config() {
    let config = ConfigLoader::from_file(&repo_config("default.toml"))
        .expect("Failed to load default config");

    assert_eq!(config.controller.api_access, ApiAccessMode::Public);
    assert_eq!(config.timing.login_timeout_secs, 800);
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_load_private_access_config() {
    let config = ConfigLoader::from_file(&repo_config("private.yaml"))
        .expect("Failed to load private access config");

    assert_eq!(config.controller.api_access, ApiAccessMode::Private);
    assert_eq!(config.logging.level, "debug");
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_file_with_env_overlay() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[backup]
bucket = "from-file"

[account]
cloud_account_number = "123456789012"
"#
    )
    .unwrap();

    // Unique prefix so parallel tests do not see each other's variables
    std::env::set_var("CTRLHA_ITEST_BACKUP__BUCKET", "from-env");
    std::env::set_var("CTRLHA_ITEST_TIMING__RESTORE_WAIT_SECS", "240");

    let config = ConfigLoader::from_file_with_env(file.path(), "CTRLHA_ITEST").unwrap();

    std::env::remove_var("CTRLHA_ITEST_BACKUP__BUCKET");
    std::env::remove_var("CTRLHA_ITEST_TIMING__RESTORE_WAIT_SECS");

    assert_eq!(config.backup.bucket, "from-env");
    assert_eq!(config.timing.restore_wait_secs, 240);
    assert_eq!(config.account.cloud_account_number, "123456789012");
}

#[test]
fn test_missing_required_file() {
    let result = ConfigLoader::from_file_with_env(&repo_config("absent.toml"), "CTRLHA_NONE");
    assert!(matches!(result, Err(ConfigError::ConfigLibError(_))));
}

#[test]
fn test_config_validation_invalid() {
    let mut config = AppConfig::default();
    config.backup.bucket = "b".to_string();
    config.account.cloud_account_number = "123456789012".to_string();
    config.timing.login_retry_delay_secs = 900;

    let result = validate_config(&config);
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}
