//! Configuration validation

use crate::{AppConfig, ConfigError, Result};
use std::net::IpAddr;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the entire application configuration, reporting every problem
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    // Controller
    if config.controller.username.trim().is_empty() {
        errors.push(ValidationError::new(
            "controller.username",
            "username is required",
        ));
    }

    if matches!(&config.controller.password, Some(p) if p.is_empty()) {
        errors.push(ValidationError::new(
            "controller.password",
            "password must not be empty when set",
        ));
    }

    if config.controller.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "controller.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    // Backup
    if config.backup.bucket.trim().is_empty() {
        errors.push(ValidationError::new("backup.bucket", "bucket is required"));
    }

    if config.backup.max_age_secs == 0 {
        errors.push(ValidationError::new(
            "backup.max_age_secs",
            "must be greater than 0",
        ));
    }

    // Account
    if config.account.name.trim().is_empty() {
        errors.push(ValidationError::new("account.name", "account name is required"));
    }

    let number = &config.account.cloud_account_number;
    if number.is_empty() {
        errors.push(ValidationError::new(
            "account.cloud_account_number",
            "cloud account number is required",
        ));
    } else if !number.chars().all(|c| c.is_ascii_digit()) {
        errors.push(ValidationError::new(
            "account.cloud_account_number",
            "must contain only digits",
        ));
    }

    for (field, role) in [
        ("account.app_role_name", &config.account.app_role_name),
        ("account.ec2_role_name", &config.account.ec2_role_name),
    ] {
        if role.trim().is_empty() {
            errors.push(ValidationError::new(field, "role name is required"));
        }
    }

    // Network
    if config.network.management_port == 0 {
        errors.push(ValidationError::new(
            "network.management_port",
            "must be greater than 0",
        ));
    }

    if let Err(e) = validate_cidr(&config.network.ingress_cidr) {
        errors.push(ValidationError::new("network.ingress_cidr", e));
    }

    // Timing
    let timing = &config.timing;
    for (field, value) in [
        ("timing.login_timeout_secs", timing.login_timeout_secs),
        ("timing.login_retry_delay_secs", timing.login_retry_delay_secs),
        ("timing.restore_wait_secs", timing.restore_wait_secs),
        ("timing.restore_poll_delay_secs", timing.restore_poll_delay_secs),
        ("timing.reconnect_delay_secs", timing.reconnect_delay_secs),
        ("timing.deadline_secs", timing.deadline_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if timing.login_retry_delay_secs > timing.login_timeout_secs {
        errors.push(ValidationError::new(
            "timing.login_retry_delay_secs",
            "must not exceed login_timeout_secs",
        ));
    }

    if timing.restore_poll_delay_secs > timing.restore_wait_secs {
        errors.push(ValidationError::new(
            "timing.restore_poll_delay_secs",
            "must not exceed restore_wait_secs",
        ));
    }

    if timing.deadline_secs <= timing.login_timeout_secs {
        errors.push(ValidationError::new(
            "timing.deadline_secs",
            "must exceed login_timeout_secs",
        ));
    }

    // Store
    if config.store.path.trim().is_empty() {
        errors.push(ValidationError::new("store.path", "database path is required"));
    }

    // Logging
    if let Err(e) = validate_log_level(&config.logging.level) {
        errors.push(e);
    }

    // Return all errors if any were found
    if !errors.is_empty() {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::ValidationError(error_msg));
    }

    Ok(())
}

/// Validate an `address/prefix` network block
pub fn validate_cidr(cidr: &str) -> std::result::Result<(), String> {
    let (address, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| format!("'{cidr}' is not in address/prefix form"))?;

    let address: IpAddr = address
        .parse()
        .map_err(|_| format!("'{address}' is not an IP address"))?;

    let prefix: u8 = prefix
        .parse()
        .map_err(|_| format!("'{prefix}' is not a prefix length"))?;

    let max = if address.is_ipv4() { 32 } else { 128 };
    if prefix > max {
        return Err(format!("prefix length {prefix} exceeds {max}"));
    }

    Ok(())
}

/// Validate log level
fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "logging.level",
            format!("invalid log level '{level}', must be one of: trace, debug, info, warn, error"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.backup.bucket = "ctrl-backups".to_string();
        config.account.cloud_account_number = "123456789012".to_string();
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_defaults_alone_are_incomplete() {
        let err = validate_config(&AppConfig::default()).unwrap_err().to_string();
        assert!(err.contains("backup.bucket"));
        assert!(err.contains("account.cloud_account_number"));
    }

    #[test]
    fn test_errors_are_accumulated() {
        let mut config = valid_config();
        config.controller.username = String::new();
        config.network.ingress_cidr = "0.0.0.0".to_string();
        config.timing.restore_poll_delay_secs = 0;
        config.logging.level = "loud".to_string();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("controller.username"));
        assert!(err.contains("network.ingress_cidr"));
        assert!(err.contains("timing.restore_poll_delay_secs"));
        assert!(err.contains("logging.level"));
    }

    #[test]
    fn test_non_numeric_account_number() {
        let mut config = valid_config();
        config.account.cloud_account_number = "12ab".to_string();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("must contain only digits"));
    }

    #[test]
    fn test_deadline_must_cover_login_window() {
        let mut config = valid_config();
        config.timing.deadline_secs = 800;
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("timing.deadline_secs"));
    }

    #[test]
    fn test_empty_password_rejected() {
        let mut config = valid_config();
        config.controller.password = Some(String::new());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_cidr() {
        assert!(validate_cidr("0.0.0.0/0").is_ok());
        assert!(validate_cidr("10.0.0.0/8").is_ok());
        assert!(validate_cidr("::/0").is_ok());
        assert!(validate_cidr("10.0.0.0/33").is_err());
        assert!(validate_cidr("host/8").is_err());
        assert!(validate_cidr("10.0.0.0").is_err());
    }
}
