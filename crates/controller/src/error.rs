use thiserror::Error;

/// Transport and decoding failures talking to the controller.
///
/// Display strings keep the phrases the controller's own tooling reports,
/// so a failure turned into a reason string classifies the same way.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Remote end closed connection without response: {0}")]
    ConnectionClosed(String),

    #[error("Failed to establish a new connection: {0}")]
    ConnectFailed(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("Unable to create session: {0}")]
    LoginRejected(String),

    #[error("not authenticated")]
    NotAuthenticated,
}
