use async_trait::async_trait;
use serde::Deserialize;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::{debug, warn};

use ctrl_ha_types::CONTROLLER_API_PATH;

use crate::{AccountProfile, ApiError, ApiResponse, ControllerApi, RestoreRequest, Session};

/// Management API client over HTTPS.
///
/// Controllers ship with self-signed certificates, so certificate checks are
/// off unless the caller turns them back on.
pub struct HttpControllerClient {
    client: reqwest::Client,
    scheme: &'static str,
}

impl HttpControllerClient {
    pub fn new(request_timeout: Duration, accept_invalid_certs: bool) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Ok(Self {
            client,
            scheme: "https",
        })
    }

    /// Plain HTTP, for local test controllers
    pub fn insecure_http(request_timeout: Duration) -> Result<Self, ApiError> {
        let mut client = Self::new(request_timeout, false)?;
        client.scheme = "http";
        Ok(client)
    }

    pub fn base_url(&self, address: &str) -> String {
        format!("{}://{}{}", self.scheme, address, CONTROLLER_API_PATH)
    }

    /// Form POST of `action` (and `subaction`) carrying the session CID
    async fn post_action(
        &self,
        session: &Session,
        action: &str,
        fields: &[(&str, &str)],
    ) -> Result<ApiResponse, ApiError> {
        let url = self.base_url(&session.owner_address);
        let mut form: Vec<(&str, &str)> = Vec::with_capacity(fields.len() + 2);
        form.push(("action", action));
        form.push(("CID", session.token.as_str()));
        form.extend_from_slice(fields);

        debug!(action, address = %session.owner_address, "Calling controller API");

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(map_transport_error)?;

        decode_response(response).await
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "return", default)]
    ok: bool,

    #[serde(rename = "CID", default)]
    cid: Option<String>,

    #[serde(default)]
    reason: Option<serde_json::Value>,
}

async fn decode_response(response: reqwest::Response) -> Result<ApiResponse, ApiError> {
    let status = response.status();
    let body = response.text().await.map_err(map_transport_error)?;

    if !status.is_success() {
        warn!("Controller API error: {} - {}", status, body);
        return Err(ApiError::Http {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Sort a reqwest failure into the transport error the restore loop
/// classifies. A peer that hangs up mid-response surfaces as hyper's
/// incomplete-message error somewhere down the source chain.
fn map_transport_error(err: reqwest::Error) -> ApiError {
    let chain = source_chain(&err);

    if chain.contains("connection closed before message completed")
        || chain.contains("IncompleteMessage")
    {
        return ApiError::ConnectionClosed(chain);
    }
    if err.is_timeout() {
        return ApiError::Timeout(chain);
    }
    if err.is_connect() {
        return ApiError::ConnectFailed(chain);
    }
    ApiError::Request(chain)
}

fn source_chain(err: &reqwest::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

#[async_trait]
impl ControllerApi for HttpControllerClient {
    async fn login(
        &self,
        address: &str,
        username: &str,
        password: &str,
    ) -> Result<Session, ApiError> {
        let url = self.base_url(address);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("action", "login"),
                ("username", username),
                ("password", password),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let login: LoginResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))?;

        match (login.ok, login.cid) {
            (true, Some(cid)) if !cid.is_empty() => Ok(Session::new(cid, address)),
            _ => {
                let reason = match login.reason {
                    Some(serde_json::Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => "no session id returned".to_string(),
                };
                Err(ApiError::LoginRejected(reason))
            }
        }
    }

    async fn initial_setup_check(&self, session: &Session) -> Result<ApiResponse, ApiError> {
        self.post_action(session, "initial_setup", &[("subaction", "check")])
            .await
    }

    async fn initial_setup_run(
        &self,
        session: &Session,
        target_version: &str,
    ) -> Result<ApiResponse, ApiError> {
        self.post_action(
            session,
            "initial_setup",
            &[("subaction", "run"), ("target_version", target_version)],
        )
        .await
    }

    async fn setup_account_profile(
        &self,
        session: &Session,
        profile: &AccountProfile,
    ) -> Result<ApiResponse, ApiError> {
        self.post_action(
            session,
            "setup_account_profile",
            &[
                ("account_name", profile.account_name.as_str()),
                ("aws_account_number", profile.account_number.as_str()),
                ("aws_role_arn", profile.app_role_arn.as_str()),
                ("aws_role_ec2", profile.ec2_role_arn.as_str()),
                ("cloud_type", "1"),
                ("aws_iam", "true"),
            ],
        )
        .await
    }

    async fn setup_customer_id(
        &self,
        session: &Session,
        customer_id: &str,
    ) -> Result<ApiResponse, ApiError> {
        self.post_action(session, "setup_customer_id", &[("customer_id", customer_id)])
            .await
    }

    async fn restore_config(
        &self,
        session: &Session,
        request: &RestoreRequest,
    ) -> Result<ApiResponse, ApiError> {
        self.post_action(
            session,
            "restore_cloudx_config",
            &[
                ("cloud_type", "1"),
                ("account_name", request.account_name.as_str()),
                ("file_name", request.file_name.as_str()),
                ("bucket_name", request.bucket_name.as_str()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let client = HttpControllerClient::new(Duration::from_secs(5), true).unwrap();
        assert_eq!(client.base_url("52.1.1.1"), "https://52.1.1.1/v1/api");

        let plain = HttpControllerClient::insecure_http(Duration::from_secs(5)).unwrap();
        assert_eq!(plain.base_url("127.0.0.1:8080"), "http://127.0.0.1:8080/v1/api");
    }

    #[test]
    fn test_login_response_parse() {
        let login: LoginResponse =
            serde_json::from_str(r#"{"return": true, "CID": "abc123"}"#).unwrap();
        assert!(login.ok);
        assert_eq!(login.cid.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_unreachable_controller_is_connect_failure() {
        let client = HttpControllerClient::insecure_http(Duration::from_secs(5)).unwrap();
        let err = client
            .login("127.0.0.1:1", "admin", "secret")
            .await
            .unwrap_err();
        assert!(
            matches!(err, ApiError::ConnectFailed(_)),
            "unexpected error: {err:?}"
        );
    }
}
