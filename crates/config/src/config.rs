//! Core configuration structures for controller HA recovery

use ctrl_ha_types::ApiAccessMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Management API access
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Configuration backups
    #[serde(default)]
    pub backup: BackupConfig,

    /// Cloud account registered on the new controller before restore
    #[serde(default)]
    pub account: AccountConfig,

    /// Temporary ingress rule
    #[serde(default)]
    pub network: NetworkConfig,

    /// Waits, polling steps and caps
    #[serde(default)]
    pub timing: TimingConfig,

    /// Durable checkpoint
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Login password for a new controller; defaults to its private address
    pub fn password_for(&self, new_private_address: &str) -> String {
        self.controller
            .password
            .clone()
            .unwrap_or_else(|| new_private_address.to_string())
    }
}

/// Management API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_username")]
    pub username: String,

    /// Initial password; absent means the new instance's private address
    #[serde(default)]
    pub password: Option<String>,

    /// Reach the API through the floating (public) or private address
    #[serde(default)]
    pub api_access: ApiAccessMode,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Controllers serve self-signed certificates
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

impl ControllerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Backup bucket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Bucket holding configuration backups
    #[serde(default)]
    pub bucket: String,

    /// Backups older than this are refused
    #[serde(default = "default_backup_max_age_secs")]
    pub max_age_secs: u64,

    /// License customer id applied after bootstrap
    #[serde(default)]
    pub customer_id: Option<String>,
}

/// Cloud account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default = "default_account_name")]
    pub name: String,

    #[serde(default)]
    pub cloud_account_number: String,

    #[serde(default = "default_app_role_name")]
    pub app_role_name: String,

    #[serde(default = "default_ec2_role_name")]
    pub ec2_role_name: String,
}

/// Ingress rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_management_port")]
    pub management_port: u16,

    #[serde(default = "default_ingress_cidr")]
    pub ingress_cidr: String,
}

/// Timing configuration, all in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Cap on accumulated login waiting
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,

    /// Wait between login attempts; also the long restore poll step
    #[serde(default = "default_login_retry_delay_secs")]
    pub login_retry_delay_secs: u64,

    /// Cap on accumulated restore waiting
    #[serde(default = "default_restore_wait_secs")]
    pub restore_wait_secs: u64,

    /// Short restore poll step
    #[serde(default = "default_restore_poll_delay_secs")]
    pub restore_poll_delay_secs: u64,

    /// Wait before logging back in after a session loss
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Pause after bootstrap before the next call
    #[serde(default = "default_bootstrap_settle_secs")]
    pub bootstrap_settle_secs: u64,

    /// Global budget for one recovery run
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// How long to wait for best-effort side tasks at the end of a run
    #[serde(default = "default_side_task_join_secs")]
    pub side_task_join_secs: u64,
}

impl TimingConfig {
    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn login_retry_delay(&self) -> Duration {
        Duration::from_secs(self.login_retry_delay_secs)
    }

    pub fn restore_wait(&self) -> Duration {
        Duration::from_secs(self.restore_wait_secs)
    }

    pub fn restore_poll_delay(&self) -> Duration {
        Duration::from_secs(self.restore_poll_delay_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn bootstrap_settle(&self) -> Duration {
        Duration::from_secs(self.bootstrap_settle_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn side_task_join(&self) -> Duration {
        Duration::from_secs(self.side_task_join_secs)
    }
}

/// Checkpoint database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of text
    #[serde(default)]
    pub json: bool,
}

// Default value functions
fn default_username() -> String {
    "admin".to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_backup_max_age_secs() -> u64 {
    3 * 24 * 60 * 60
}

fn default_account_name() -> String {
    "tempacc".to_string()
}

fn default_app_role_name() -> String {
    "aviatrix-role-app".to_string()
}

fn default_ec2_role_name() -> String {
    "aviatrix-role-ec2".to_string()
}

fn default_management_port() -> u16 {
    443
}

fn default_ingress_cidr() -> String {
    "0.0.0.0/0".to_string()
}

fn default_login_timeout_secs() -> u64 {
    800
}

fn default_login_retry_delay_secs() -> u64 {
    30
}

fn default_restore_wait_secs() -> u64 {
    180
}

fn default_restore_poll_delay_secs() -> u64 {
    10
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

fn default_bootstrap_settle_secs() -> u64 {
    20
}

fn default_deadline_secs() -> u64 {
    900
}

fn default_side_task_join_secs() -> u64 {
    5
}

fn default_store_path() -> String {
    "ctrl-ha.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: None,
            api_access: ApiAccessMode::default(),
            request_timeout_secs: default_request_timeout_secs(),
            accept_invalid_certs: default_true(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            max_age_secs: default_backup_max_age_secs(),
            customer_id: None,
        }
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            name: default_account_name(),
            cloud_account_number: String::new(),
            app_role_name: default_app_role_name(),
            ec2_role_name: default_ec2_role_name(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            management_port: default_management_port(),
            ingress_cidr: default_ingress_cidr(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            login_timeout_secs: default_login_timeout_secs(),
            login_retry_delay_secs: default_login_retry_delay_secs(),
            restore_wait_secs: default_restore_wait_secs(),
            restore_poll_delay_secs: default_restore_poll_delay_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            bootstrap_settle_secs: default_bootstrap_settle_secs(),
            deadline_secs: default_deadline_secs(),
            side_task_join_secs: default_side_task_join_secs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
