use ctrl_ha_retry::DeadlineExceeded;
use ctrl_ha_store::StoreError;
use ctrl_ha_types::{ContextError, FailureKind, VersionParseError};
use thiserror::Error;

use crate::cloud::CloudError;

/// Builder error
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("missing required field: {field}")]
    MissingField { field: String },
}

/// Everything that ends a recovery run early
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Malformed or missing input data; retrying cannot help
    #[error("invalid input: {0}")]
    FatalInput(String),

    /// The controller rejected a call with an unrecognised reason
    #[error("controller rejected the request: {reason}")]
    FatalRemote { reason: String },

    #[error(transparent)]
    DeadlineExceeded(#[from] DeadlineExceeded),

    /// The new instance never answered; it has been handed back for replacement
    #[error("instance unrecoverable: {0}")]
    InstanceUnrecoverable(String),

    #[error("cloud error: {0}")]
    Cloud(#[from] CloudError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("builder error: {0}")]
    Builder(#[from] BuilderError),
}

impl RecoveryError {
    pub fn fatal_remote(reason: impl Into<String>) -> Self {
        RecoveryError::FatalRemote {
            reason: reason.into(),
        }
    }

    /// Failure class reported in the run's outcome
    pub fn kind(&self) -> FailureKind {
        match self {
            RecoveryError::FatalInput(_) => FailureKind::FatalInput,
            RecoveryError::FatalRemote { .. } => FailureKind::FatalRemote,
            RecoveryError::DeadlineExceeded(_) => FailureKind::DeadlineExceeded,
            RecoveryError::InstanceUnrecoverable(_) => FailureKind::InstanceUnrecoverable,
            RecoveryError::Cloud(_) | RecoveryError::Store(_) | RecoveryError::Builder(_) => {
                FailureKind::Infrastructure
            }
        }
    }
}

impl From<ContextError> for RecoveryError {
    fn from(err: ContextError) -> Self {
        RecoveryError::FatalInput(err.to_string())
    }
}

impl From<VersionParseError> for RecoveryError {
    fn from(err: VersionParseError) -> Self {
        RecoveryError::FatalInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            RecoveryError::FatalInput("x".into()).kind(),
            FailureKind::FatalInput
        );
        assert_eq!(
            RecoveryError::fatal_remote("Account name is invalid").kind(),
            FailureKind::FatalRemote
        );
        assert_eq!(
            RecoveryError::from(DeadlineExceeded {
                elapsed: Duration::from_secs(901),
                budget: Duration::from_secs(900),
            })
            .kind(),
            FailureKind::DeadlineExceeded
        );
        assert_eq!(
            RecoveryError::from(CloudError::other("throttled")).kind(),
            FailureKind::Infrastructure
        );
    }

    #[test]
    fn test_version_errors_are_fatal_input() {
        let err = RecoveryError::from(VersionParseError::Empty);
        assert_eq!(err.kind(), FailureKind::FatalInput);
        assert!(err.to_string().contains("empty"));
    }
}
