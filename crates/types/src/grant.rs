use serde::{Deserialize, Serialize};

/// Temporary management-port ingress rule on a security group.
///
/// A grant the orchestrator created is *owned* and must be reverted exactly
/// once; a pre-existing rule is left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupGrant {
    pub group_id: String,
    pub already_present: bool,
}

impl SecurityGroupGrant {
    /// Rule created by this run
    pub fn owned(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            already_present: false,
        }
    }

    /// Rule that existed before this run, or no rule needed at all
    pub fn pre_existing(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            already_present: true,
        }
    }

    pub fn is_owned(&self) -> bool {
        !self.already_present
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_ownership() {
        assert!(SecurityGroupGrant::owned("sg-1").is_owned());
        assert!(!SecurityGroupGrant::pre_existing("sg-1").is_owned());
    }
}
