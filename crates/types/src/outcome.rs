use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Stages of a single recovery run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStage {
    Start,
    AddressAssigned,
    GuardOpened,
    Authenticated,
    VersionResolved,
    BootstrapComplete,
    AccountReady,
    Restored,
    Failed,
}

impl RecoveryStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStage::Start => "start",
            RecoveryStage::AddressAssigned => "address_assigned",
            RecoveryStage::GuardOpened => "guard_opened",
            RecoveryStage::Authenticated => "authenticated",
            RecoveryStage::VersionResolved => "version_resolved",
            RecoveryStage::BootstrapComplete => "bootstrap_complete",
            RecoveryStage::AccountReady => "account_ready",
            RecoveryStage::Restored => "restored",
            RecoveryStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RecoveryStage::Restored | RecoveryStage::Failed)
    }
}

impl std::fmt::Display for RecoveryStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoveryStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(RecoveryStage::Start),
            "address_assigned" => Ok(RecoveryStage::AddressAssigned),
            "guard_opened" => Ok(RecoveryStage::GuardOpened),
            "authenticated" => Ok(RecoveryStage::Authenticated),
            "version_resolved" => Ok(RecoveryStage::VersionResolved),
            "bootstrap_complete" => Ok(RecoveryStage::BootstrapComplete),
            "account_ready" => Ok(RecoveryStage::AccountReady),
            "restored" => Ok(RecoveryStage::Restored),
            "failed" => Ok(RecoveryStage::Failed),
            other => Err(format!("unknown recovery stage: {other}")),
        }
    }
}

/// How a successful recovery was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorePath {
    /// This run restored the backup
    Fresh,

    /// A previous, interrupted run had already restored it
    PriorRun,
}

/// Classification of a failed recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed or missing backup data, missing address
    FatalInput,

    /// The controller rejected a call with an unclassified reason
    FatalRemote,

    /// The time budget ran out
    DeadlineExceeded,

    /// The instance never became reachable and was handed back for replacement
    InstanceUnrecoverable,

    /// Cloud control plane or durable store failure
    Infrastructure,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::FatalInput => "fatal_input",
            FailureKind::FatalRemote => "fatal_remote",
            FailureKind::DeadlineExceeded => "deadline_exceeded",
            FailureKind::InstanceUnrecoverable => "instance_unrecoverable",
            FailureKind::Infrastructure => "infrastructure",
        }
    }
}

/// The single result an invocation of `recover` reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    Restored {
        path: RestorePath,
    },

    /// The instance was already recorded as current
    Skipped {
        instance_id: String,
    },

    Failed {
        stage: RecoveryStage,
        kind: FailureKind,
        reason: String,
    },
}

impl RecoveryOutcome {
    pub fn is_restored(&self) -> bool {
        matches!(self, RecoveryOutcome::Restored { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RecoveryOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RecoveryOutcome::Failed { .. })
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            RecoveryOutcome::Restored { .. } => "restored",
            RecoveryOutcome::Skipped { .. } => "skipped",
            RecoveryOutcome::Failed { .. } => "failed",
        }
    }
}
