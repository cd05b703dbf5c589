use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{ApiError, Session};

/// Generic `{return, reason}` reply of the management API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(rename = "return", default)]
    pub ok: bool,

    #[serde(default, deserialize_with = "reason_as_string")]
    pub reason: Option<String>,
}

impl ApiResponse {
    pub fn success() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }

    /// Stand-in reply for a call whose connection the controller dropped
    /// while carrying out the request
    pub fn presumed_success() -> Self {
        Self {
            ok: true,
            reason: Some("Warning!! Server closed the connection".to_string()),
        }
    }

    pub fn reason_str(&self) -> &str {
        self.reason.as_deref().unwrap_or("")
    }
}

/// Controllers sometimes return structured reasons; keep them as text
fn reason_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Cloud account registration used as the restore target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProfile {
    pub account_name: String,
    pub account_number: String,
    pub app_role_arn: String,
    pub ec2_role_arn: String,
}

impl AccountProfile {
    pub fn new(
        account_name: impl Into<String>,
        account_number: impl Into<String>,
        app_role_name: &str,
        ec2_role_name: &str,
    ) -> Self {
        let account_number = account_number.into();
        Self {
            account_name: account_name.into(),
            app_role_arn: format!("arn:aws:iam::{account_number}:role/{app_role_name}"),
            ec2_role_arn: format!("arn:aws:iam::{account_number}:role/{ec2_role_name}"),
            account_number,
        }
    }
}

/// Which backup object to restore, and through which account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub account_name: String,
    pub file_name: String,
    pub bucket_name: String,
}

/// Remote calls recovery makes against a controller
#[async_trait]
pub trait ControllerApi: Send + Sync {
    /// Create a session on the controller at `address`
    async fn login(&self, address: &str, username: &str, password: &str)
        -> Result<Session, ApiError>;

    /// `initial_setup/check`: has bootstrap completed
    async fn initial_setup_check(&self, session: &Session) -> Result<ApiResponse, ApiError>;

    /// `initial_setup/run`: bootstrap to `target_version`
    async fn initial_setup_run(
        &self,
        session: &Session,
        target_version: &str,
    ) -> Result<ApiResponse, ApiError>;

    /// `setup_account_profile`
    async fn setup_account_profile(
        &self,
        session: &Session,
        profile: &AccountProfile,
    ) -> Result<ApiResponse, ApiError>;

    /// `setup_customer_id`
    async fn setup_customer_id(
        &self,
        session: &Session,
        customer_id: &str,
    ) -> Result<ApiResponse, ApiError>;

    /// `restore_cloudx_config`
    async fn restore_config(
        &self,
        session: &Session,
        request: &RestoreRequest,
    ) -> Result<ApiResponse, ApiError>;
}
