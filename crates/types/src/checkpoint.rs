use serde::{Deserialize, Serialize};

/// Durable record carried between separate process invocations.
///
/// This is the only cross-invocation state: the current controller identity
/// used for idempotence, and the owned ingress grant that still needs revert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Instance recorded as the current controller
    pub current_instance_id: Option<String>,

    /// Private address of the current controller; names its backups
    pub current_private_address: Option<String>,

    /// Floating address bound to the current controller
    pub floating_address: Option<String>,

    /// Security group holding an owned, not yet reverted ingress rule
    pub pending_grant_group: Option<String>,

    /// Last update (Unix timestamp in seconds)
    pub updated_at: u64,
}

impl Checkpoint {
    /// Whether `instance_id` is already recorded as the current controller
    pub fn is_current(&self, instance_id: &str) -> bool {
        self.current_instance_id.as_deref() == Some(instance_id)
    }

    pub fn has_pending_grant(&self) -> bool {
        self.pending_grant_group.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_current() {
        let checkpoint = Checkpoint {
            current_instance_id: Some("i-1".to_string()),
            ..Checkpoint::default()
        };
        assert!(checkpoint.is_current("i-1"));
        assert!(!checkpoint.is_current("i-2"));
        assert!(!Checkpoint::default().is_current("i-1"));
    }

    #[test]
    fn test_checkpoint_json_roundtrip_defaults() {
        let checkpoint: Checkpoint = serde_json::from_str(
            r#"{"current_instance_id":"i-1","current_private_address":null,
                "floating_address":null,"pending_grant_group":"sg-1","updated_at":5}"#,
        )
        .unwrap();
        assert!(checkpoint.has_pending_grant());
        assert_eq!(checkpoint.updated_at, 5);
    }
}
