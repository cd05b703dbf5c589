use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::Checkpoint;

/// How the orchestrator reaches the controller management API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiAccessMode {
    /// Through the floating address; requires a temporary ingress rule
    #[default]
    Public,

    /// Through the new instance's private address; no ingress change needed
    Private,
}

impl ApiAccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiAccessMode::Public => "public",
            ApiAccessMode::Private => "private",
        }
    }
}

impl std::fmt::Display for ApiAccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly launched controller instance as seen by the event router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub instance_id: String,

    pub private_address: String,

    /// Attached security groups, primary first
    #[serde(default)]
    pub security_groups: Vec<String>,
}

impl InstanceInfo {
    pub fn new(instance_id: impl Into<String>, private_address: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            private_address: private_address.into(),
            security_groups: Vec::new(),
        }
    }

    pub fn with_security_group(mut self, group_id: impl Into<String>) -> Self {
        self.security_groups.push(group_id.into());
        self
    }

    pub fn primary_security_group(&self) -> Option<&str> {
        self.security_groups.first().map(String::as_str)
    }
}

/// Recovery request delivered by the external event router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryTrigger {
    /// The replacement instance
    pub instance: InstanceInfo,

    /// Floating address to move onto the replacement
    pub floating_address: String,
}

impl RecoveryTrigger {
    pub fn new(instance: InstanceInfo, floating_address: impl Into<String>) -> Self {
        Self {
            instance,
            floating_address: floating_address.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("missing {field}")]
    Missing { field: &'static str },
}

/// Per-invocation recovery state.
///
/// Everything but the elapsed counters is fixed when the context is built.
#[derive(Debug, Clone)]
pub struct RecoveryContext {
    pub replaced_instance_id: Option<String>,
    pub new_instance: InstanceInfo,
    pub floating_address: String,
    pub old_private_address: String,
    pub api_access: ApiAccessMode,
    pub deadline_budget: Duration,
    login_elapsed: Duration,
    restore_elapsed: Duration,
}

impl RecoveryContext {
    /// Combine a trigger with the last durable checkpoint
    pub fn new(
        trigger: &RecoveryTrigger,
        checkpoint: &Checkpoint,
        api_access: ApiAccessMode,
        deadline_budget: Duration,
    ) -> Result<Self, ContextError> {
        if trigger.floating_address.trim().is_empty() {
            return Err(ContextError::Missing {
                field: "floating address",
            });
        }
        if trigger.instance.private_address.trim().is_empty() {
            return Err(ContextError::Missing {
                field: "new private address",
            });
        }
        let old_private_address = checkpoint
            .current_private_address
            .clone()
            .filter(|addr| !addr.trim().is_empty())
            .ok_or(ContextError::Missing {
                field: "previous private address",
            })?;

        Ok(Self {
            replaced_instance_id: checkpoint.current_instance_id.clone(),
            new_instance: trigger.instance.clone(),
            floating_address: trigger.floating_address.clone(),
            old_private_address,
            api_access,
            deadline_budget,
            login_elapsed: Duration::ZERO,
            restore_elapsed: Duration::ZERO,
        })
    }

    pub fn new_instance_id(&self) -> &str {
        &self.new_instance.instance_id
    }

    pub fn new_private_address(&self) -> &str {
        &self.new_instance.private_address
    }

    /// Address the management API is reached on
    pub fn api_address(&self) -> &str {
        match self.api_access {
            ApiAccessMode::Public => &self.floating_address,
            ApiAccessMode::Private => &self.new_instance.private_address,
        }
    }

    pub fn add_login_elapsed(&mut self, elapsed: Duration) {
        self.login_elapsed += elapsed;
    }

    pub fn add_restore_elapsed(&mut self, elapsed: Duration) {
        self.restore_elapsed += elapsed;
    }

    pub fn login_elapsed(&self) -> Duration {
        self.login_elapsed
    }

    pub fn restore_elapsed(&self) -> Duration {
        self.restore_elapsed
    }
}
