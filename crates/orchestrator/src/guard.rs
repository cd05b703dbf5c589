//! Temporary management-port ingress for the new controller.
//!
//! An owned rule is recorded in the checkpoint store as soon as it exists
//! and is only forgotten after it has been removed, so a run killed in
//! between leaves enough behind for the next run to clean up.

use std::sync::Arc;

use ctrl_ha_metrics::{GuardEvent, MetricsCollector};
use ctrl_ha_store::CheckpointStore;
use ctrl_ha_types::{ApiAccessMode, InstanceInfo, SecurityGroupGrant};
use tracing::{error, info, warn};

use crate::cloud::{CloudErrorKind, IngressRule, IngressRules};
use crate::error::RecoveryError;

/// Result of a revert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertOutcome {
    /// The grant was not ours; nothing was touched
    NotOwned,

    Reverted,

    /// Someone else already removed the rule or its group
    AlreadyGone,
}

pub struct SecurityGuard {
    rules: Arc<dyn IngressRules>,
    store: Arc<dyn CheckpointStore>,
    metrics: Arc<MetricsCollector>,
    port: u16,
    cidr: String,
}

impl SecurityGuard {
    pub fn new(
        rules: Arc<dyn IngressRules>,
        store: Arc<dyn CheckpointStore>,
        metrics: Arc<MetricsCollector>,
        port: u16,
        cidr: impl Into<String>,
    ) -> Self {
        Self {
            rules,
            store,
            metrics,
            port,
            cidr: cidr.into(),
        }
    }

    fn rule_for(&self, group_id: &str) -> IngressRule {
        IngressRule::tcp(group_id, self.port, self.cidr.clone())
    }

    /// Make the management port of `instance` reachable.
    ///
    /// Returns an owned grant only after the rule exists and has been
    /// recorded as pending.
    pub async fn open(
        &self,
        instance: &InstanceInfo,
        mode: ApiAccessMode,
    ) -> Result<SecurityGroupGrant, RecoveryError> {
        let group_id = instance.primary_security_group().unwrap_or_default();

        if mode == ApiAccessMode::Private {
            info!(group_id, "Private API access, no ingress rule needed");
            self.metrics.record_guard_event(GuardEvent::PreExisting);
            return Ok(SecurityGroupGrant::pre_existing(group_id));
        }

        if group_id.is_empty() {
            return Err(RecoveryError::FatalInput(format!(
                "instance {} has no security group",
                instance.instance_id
            )));
        }

        let rule = self.rule_for(group_id);
        match self.rules.add_rule(&rule).await {
            Ok(()) => {}
            Err(e) if e.kind == CloudErrorKind::Duplicate => {
                info!(group_id, port = self.port, "Ingress rule already present");
                self.metrics.record_guard_event(GuardEvent::PreExisting);
                return Ok(SecurityGroupGrant::pre_existing(group_id));
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self.store.set_pending_grant(group_id).await {
            error!(group_id, error = %e, kind = "store", "Could not record ingress rule, removing it");
            if let Err(revoke) = self.rules.remove_rule(&rule).await {
                if !revoke.is_gone() {
                    error!(group_id, error = %revoke, kind = "cloud", "Unrecorded ingress rule left open");
                }
            }
            return Err(e.into());
        }

        info!(group_id, port = self.port, cidr = %self.cidr, "Opened temporary ingress rule");
        self.metrics.record_guard_event(GuardEvent::Opened);
        Ok(SecurityGroupGrant::owned(group_id))
    }

    /// Remove an owned rule, then forget it.
    ///
    /// On a failed removal the pending record is kept for the next run.
    pub async fn revert(&self, grant: &SecurityGroupGrant) -> Result<RevertOutcome, RecoveryError> {
        if !grant.is_owned() {
            return Ok(RevertOutcome::NotOwned);
        }

        let group_id = grant.group_id.as_str();
        let outcome = match self.rules.remove_rule(&self.rule_for(group_id)).await {
            Ok(()) => {
                info!(group_id, "Reverted temporary ingress rule");
                self.metrics.record_guard_event(GuardEvent::Reverted);
                RevertOutcome::Reverted
            }
            Err(e) if e.is_gone() => {
                warn!(group_id, error = %e, "Ingress rule already gone");
                self.metrics.record_guard_event(GuardEvent::AlreadyGone);
                RevertOutcome::AlreadyGone
            }
            Err(e) => {
                self.metrics.record_guard_event(GuardEvent::RevertFailed);
                return Err(e.into());
            }
        };

        self.store.clear_pending_grant().await?;
        Ok(outcome)
    }

    /// Revert a grant known only by its recorded group
    pub async fn revert_recorded(&self, group_id: &str) -> Result<RevertOutcome, RecoveryError> {
        self.revert(&SecurityGroupGrant::owned(group_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::CloudError;
    use async_trait::async_trait;
    use ctrl_ha_store::InMemoryCheckpointStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedRules {
        add_error: Option<CloudError>,
        remove_error: Option<CloudError>,
        added: Mutex<Vec<IngressRule>>,
        removed: Mutex<Vec<IngressRule>>,
    }

    #[async_trait]
    impl IngressRules for ScriptedRules {
        async fn add_rule(&self, rule: &IngressRule) -> Result<(), CloudError> {
            self.added.lock().unwrap().push(rule.clone());
            self.add_error.clone().map_or(Ok(()), Err)
        }

        async fn remove_rule(&self, rule: &IngressRule) -> Result<(), CloudError> {
            self.removed.lock().unwrap().push(rule.clone());
            self.remove_error.clone().map_or(Ok(()), Err)
        }
    }

    fn instance() -> InstanceInfo {
        InstanceInfo::new("i-new", "10.0.0.9").with_security_group("sg-ctrl")
    }

    fn guard(rules: Arc<ScriptedRules>, store: Arc<InMemoryCheckpointStore>) -> SecurityGuard {
        SecurityGuard::new(
            rules,
            store,
            Arc::new(MetricsCollector::new()),
            443,
            "0.0.0.0/0",
        )
    }

    #[tokio::test]
    async fn test_private_mode_touches_nothing() {
        let rules = Arc::new(ScriptedRules::default());
        let store = Arc::new(InMemoryCheckpointStore::new());
        let guard = guard(rules.clone(), store.clone());

        let grant = guard.open(&instance(), ApiAccessMode::Private).await.unwrap();
        assert!(!grant.is_owned());
        assert!(rules.added.lock().unwrap().is_empty());

        assert_eq!(guard.revert(&grant).await.unwrap(), RevertOutcome::NotOwned);
        assert!(rules.removed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_owned_grant_is_recorded_then_cleared() {
        let rules = Arc::new(ScriptedRules::default());
        let store = Arc::new(InMemoryCheckpointStore::new());
        let guard = guard(rules.clone(), store.clone());

        let grant = guard.open(&instance(), ApiAccessMode::Public).await.unwrap();
        assert!(grant.is_owned());
        assert_eq!(
            rules.added.lock().unwrap()[0],
            IngressRule::tcp("sg-ctrl", 443, "0.0.0.0/0")
        );
        assert_eq!(
            store.load().await.unwrap().pending_grant_group.as_deref(),
            Some("sg-ctrl")
        );

        assert_eq!(guard.revert(&grant).await.unwrap(), RevertOutcome::Reverted);
        assert_eq!(rules.removed.lock().unwrap().len(), 1);
        assert!(!store.load().await.unwrap().has_pending_grant());
    }

    #[tokio::test]
    async fn test_duplicate_rule_is_not_owned() {
        let rules = Arc::new(ScriptedRules {
            add_error: Some(CloudError::duplicate("InvalidPermission.Duplicate")),
            ..Default::default()
        });
        let store = Arc::new(InMemoryCheckpointStore::new());
        let guard = guard(rules.clone(), store.clone());

        let grant = guard.open(&instance(), ApiAccessMode::Public).await.unwrap();
        assert!(!grant.is_owned());
        assert!(!store.load().await.unwrap().has_pending_grant());
    }

    #[tokio::test]
    async fn test_open_failure_records_nothing() {
        let rules = Arc::new(ScriptedRules {
            add_error: Some(CloudError::other("UnauthorizedOperation")),
            ..Default::default()
        });
        let store = Arc::new(InMemoryCheckpointStore::new());
        let guard = guard(rules, store.clone());

        let err = guard
            .open(&instance(), ApiAccessMode::Public)
            .await
            .unwrap_err();
        assert!(matches!(err, RecoveryError::Cloud(_)));
        assert!(!store.load().await.unwrap().has_pending_grant());
    }

    #[tokio::test]
    async fn test_missing_rule_is_benign() {
        let rules = Arc::new(ScriptedRules {
            remove_error: Some(CloudError::not_found("InvalidPermission.NotFound")),
            ..Default::default()
        });
        let store = Arc::new(InMemoryCheckpointStore::new());
        let guard = guard(rules, store.clone());

        let grant = guard.open(&instance(), ApiAccessMode::Public).await.unwrap();
        assert_eq!(
            guard.revert(&grant).await.unwrap(),
            RevertOutcome::AlreadyGone
        );
        assert!(!store.load().await.unwrap().has_pending_grant());
    }

    #[tokio::test]
    async fn test_failed_revert_keeps_record() {
        let rules = Arc::new(ScriptedRules {
            remove_error: Some(CloudError::other("RequestLimitExceeded")),
            ..Default::default()
        });
        let store = Arc::new(InMemoryCheckpointStore::new());
        let guard = guard(rules, store.clone());

        let grant = guard.open(&instance(), ApiAccessMode::Public).await.unwrap();
        assert!(guard.revert(&grant).await.is_err());
        assert_eq!(
            store.load().await.unwrap().pending_grant_group.as_deref(),
            Some("sg-ctrl")
        );
    }

    #[tokio::test]
    async fn test_public_mode_requires_a_group() {
        let rules = Arc::new(ScriptedRules::default());
        let guard = guard(rules, Arc::new(InMemoryCheckpointStore::new()));

        let err = guard
            .open(&InstanceInfo::new("i-new", "10.0.0.9"), ApiAccessMode::Public)
            .await
            .unwrap_err();
        assert!(matches!(err, RecoveryError::FatalInput(_)));
    }
}
