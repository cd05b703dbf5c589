//! Cloud control-plane capabilities a recovery run consumes.
//!
//! Provider adapters live outside this crate; recovery only needs these
//! narrow operations.

use async_trait::async_trait;
use thiserror::Error;

/// What went wrong on the provider side, as far as recovery cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudErrorKind {
    /// The resource being created already exists
    Duplicate,

    /// The resource being removed does not exist
    NotFound,

    /// The security group itself is gone
    GroupNotFound,

    Other,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CloudError {
    pub kind: CloudErrorKind,
    pub message: String,
}

impl CloudError {
    pub fn new(kind: CloudErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::Duplicate, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::NotFound, message)
    }

    pub fn group_not_found(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::GroupNotFound, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::Other, message)
    }

    /// Removal target already absent
    pub fn is_gone(&self) -> bool {
        matches!(
            self.kind,
            CloudErrorKind::NotFound | CloudErrorKind::GroupNotFound
        )
    }
}

/// A single inbound rule: one protocol, one port, one source block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub group_id: String,
    pub protocol: String,
    pub port: u16,
    pub cidr: String,
}

impl IngressRule {
    pub fn tcp(group_id: impl Into<String>, port: u16, cidr: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            protocol: "tcp".to_string(),
            port,
            cidr: cidr.into(),
        }
    }
}

/// Object bytes plus its last write time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,

    /// Unix seconds
    pub last_modified: u64,
}

impl StoredObject {
    /// Seconds between the last write and `now`
    pub fn age_at(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_modified)
    }
}

/// Binds the floating address to an instance
#[async_trait]
pub trait AddressAssigner: Send + Sync {
    async fn assign(&self, floating_address: &str, instance_id: &str) -> Result<(), CloudError>;
}

/// Adds and removes single inbound rules
#[async_trait]
pub trait IngressRules: Send + Sync {
    /// Fails with `Duplicate` when the rule is already present
    async fn add_rule(&self, rule: &IngressRule) -> Result<(), CloudError>;

    /// Fails with `NotFound` or `GroupNotFound` when there is nothing to remove
    async fn remove_rule(&self, rule: &IngressRule) -> Result<(), CloudError>;
}

/// Read access to the backup bucket
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fails with `NotFound` when the key does not exist
    async fn fetch(&self, key: &str) -> Result<StoredObject, CloudError>;
}

/// Instance lifecycle operations
#[async_trait]
pub trait InstanceControl: Send + Sync {
    /// Stop an instance so its scaling group replaces it
    async fn stop_instance(&self, instance_id: &str) -> Result<(), CloudError>;

    /// Switch the instance to unlimited burst credits
    async fn enable_unlimited_credits(&self, instance_id: &str) -> Result<(), CloudError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gone_errors() {
        assert!(CloudError::not_found("InvalidPermission.NotFound").is_gone());
        assert!(CloudError::group_not_found("InvalidGroup.NotFound").is_gone());
        assert!(!CloudError::duplicate("InvalidPermission.Duplicate").is_gone());
        assert!(!CloudError::other("RequestLimitExceeded").is_gone());
    }

    #[test]
    fn test_object_age() {
        let object = StoredObject {
            bytes: Vec::new(),
            last_modified: 1_000,
        };
        assert_eq!(object.age_at(4_600), 3_600);
        assert_eq!(object.age_at(500), 0);
    }
}
