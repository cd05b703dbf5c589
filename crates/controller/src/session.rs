use std::sync::Arc;
use tracing::{debug, info};

use crate::{ApiError, ControllerApi};

/// Session token issued by one controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,

    /// Address the token was issued by; calls go back to it
    pub owner_address: String,
}

impl Session {
    pub fn new(token: impl Into<String>, owner_address: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            owner_address: owner_address.into(),
        }
    }
}

/// Login credentials for the management API
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The session a recovery run holds against the new controller.
///
/// At most one token is live; re-authenticating replaces it.
pub struct ControllerSession {
    api: Arc<dyn ControllerApi>,
    address: String,
    credentials: Credentials,
    current: Option<Session>,
    logins: u32,
}

impl ControllerSession {
    pub fn new(
        api: Arc<dyn ControllerApi>,
        address: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            api,
            address: address.into(),
            credentials,
            current: None,
            logins: 0,
        }
    }

    /// Log in and keep the new token. A failed login leaves no token behind.
    pub async fn authenticate(&mut self) -> Result<&Session, ApiError> {
        self.current = None;
        debug!(address = %self.address, "Logging in to controller");

        let session = self
            .api
            .login(
                &self.address,
                &self.credentials.username,
                &self.credentials.password,
            )
            .await?;

        self.logins += 1;
        info!(address = %self.address, logins = self.logins, "Controller session established");
        Ok(&*self.current.insert(session))
    }

    /// The live token
    pub fn require(&self) -> Result<&Session, ApiError> {
        self.current.as_ref().ok_or(ApiError::NotAuthenticated)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    /// Drop the token after the controller reported it expired
    pub fn invalidate(&mut self) {
        if self.current.take().is_some() {
            debug!(address = %self.address, "Controller session invalidated");
        }
    }

    pub fn api(&self) -> &Arc<dyn ControllerApi> {
        &self.api
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Successful logins over the lifetime of this session
    pub fn logins(&self) -> u32 {
        self.logins
    }
}
