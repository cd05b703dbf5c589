use std::sync::Arc;
use std::time::Duration;

use ctrl_ha_config::AppConfig;
use ctrl_ha_controller::{AccountProfile, ControllerApi, ControllerSession, Credentials, RestoreRequest};
use ctrl_ha_metrics::{MetricsCollector, RecoverySpan};
use ctrl_ha_retry::{Deadline, PollBudget};
use ctrl_ha_store::CheckpointStore;
use ctrl_ha_types::{
    backup_object_key, parse_target_version, version_object_key, BackupArtifact, RecoveryContext,
    RecoveryOutcome, RecoveryStage, RecoveryTrigger, RestorePath,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

use crate::bootstrap::{BootstrapDriver, BootstrapResult};
use crate::cloud::{
    AddressAssigner, ArtifactStore, CloudError, CloudErrorKind, IngressRules, InstanceControl,
    StoredObject,
};
use crate::error::{BuilderError, RecoveryError};
use crate::guard::{RevertOutcome, SecurityGuard};
use crate::progress::{unix_now, StageTracker};
use crate::restorer::{BackupRestorer, RestoreSettings, RestoreState};

/// Builder for RecoveryOrchestrator
pub struct RecoveryOrchestratorBuilder {
    controller_api: Option<Arc<dyn ControllerApi>>,
    address_assigner: Option<Arc<dyn AddressAssigner>>,
    ingress_rules: Option<Arc<dyn IngressRules>>,
    artifact_store: Option<Arc<dyn ArtifactStore>>,
    instance_control: Option<Arc<dyn InstanceControl>>,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    metrics: Option<Arc<MetricsCollector>>,
    config: AppConfig,
}

impl RecoveryOrchestratorBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            controller_api: None,
            address_assigner: None,
            ingress_rules: None,
            artifact_store: None,
            instance_control: None,
            checkpoint_store: None,
            metrics: None,
            config: AppConfig::default(),
        }
    }

    /// Set the management API client
    pub fn with_controller_api(mut self, api: Arc<dyn ControllerApi>) -> Self {
        self.controller_api = Some(api);
        self
    }

    pub fn with_address_assigner(mut self, assigner: Arc<dyn AddressAssigner>) -> Self {
        self.address_assigner = Some(assigner);
        self
    }

    pub fn with_ingress_rules(mut self, rules: Arc<dyn IngressRules>) -> Self {
        self.ingress_rules = Some(rules);
        self
    }

    /// Set the backup bucket reader
    pub fn with_artifact_store(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifact_store = Some(artifacts);
        self
    }

    pub fn with_instance_control(mut self, instances: Arc<dyn InstanceControl>) -> Self {
        self.instance_control = Some(instances);
        self
    }

    /// Set the durable checkpoint store
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint_store = Some(store);
        self
    }

    /// Share a metrics collector; a private one is created otherwise
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the RecoveryOrchestrator, validating that all required fields are set
    pub fn build(self) -> Result<RecoveryOrchestrator, BuilderError> {
        let api = self.controller_api.ok_or_else(|| BuilderError::MissingField {
            field: "controller_api".to_string(),
        })?;

        let addresses = self.address_assigner.ok_or_else(|| BuilderError::MissingField {
            field: "address_assigner".to_string(),
        })?;

        let rules = self.ingress_rules.ok_or_else(|| BuilderError::MissingField {
            field: "ingress_rules".to_string(),
        })?;

        let artifacts = self.artifact_store.ok_or_else(|| BuilderError::MissingField {
            field: "artifact_store".to_string(),
        })?;

        let instances = self.instance_control.ok_or_else(|| BuilderError::MissingField {
            field: "instance_control".to_string(),
        })?;

        let store = self.checkpoint_store.ok_or_else(|| BuilderError::MissingField {
            field: "checkpoint_store".to_string(),
        })?;

        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(MetricsCollector::new()));

        let guard = SecurityGuard::new(
            rules,
            store.clone(),
            metrics.clone(),
            self.config.network.management_port,
            self.config.network.ingress_cidr.clone(),
        );
        let bootstrap = BootstrapDriver::new(self.config.timing.bootstrap_settle(), metrics.clone());

        Ok(RecoveryOrchestrator {
            api,
            addresses,
            artifacts,
            instances,
            store,
            guard,
            bootstrap,
            metrics,
            config: self.config,
        })
    }
}

impl Default for RecoveryOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Restores a replacement controller from the backup of the one it replaces
pub struct RecoveryOrchestrator {
    api: Arc<dyn ControllerApi>,
    addresses: Arc<dyn AddressAssigner>,
    artifacts: Arc<dyn ArtifactStore>,
    instances: Arc<dyn InstanceControl>,
    store: Arc<dyn CheckpointStore>,
    guard: SecurityGuard,
    bootstrap: BootstrapDriver,
    metrics: Arc<MetricsCollector>,
    config: AppConfig,
}

impl RecoveryOrchestrator {
    /// Create a new builder for constructing a RecoveryOrchestrator
    pub fn builder() -> RecoveryOrchestratorBuilder {
        RecoveryOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Instance recorded as the current controller, if any
    pub async fn current_instance_identity(&self) -> Result<Option<String>, RecoveryError> {
        Ok(self.store.load().await?.current_instance_id)
    }

    /// Revert an ingress rule an interrupted run left recorded as owned
    pub async fn resume_pending_cleanup(&self) -> Result<Option<RevertOutcome>, RecoveryError> {
        let checkpoint = self.store.load().await?;
        let Some(group_id) = checkpoint.pending_grant_group else {
            return Ok(None);
        };

        warn!(group_id = %group_id, "Reverting ingress rule left by an interrupted run");
        let outcome = self.guard.revert_recorded(&group_id).await?;
        Ok(Some(outcome))
    }

    /// Handle one recovery trigger. Every path ends in exactly one outcome.
    pub async fn recover(&self, trigger: &RecoveryTrigger) -> RecoveryOutcome {
        let span = RecoverySpan::new(trigger.instance.instance_id.clone());
        let run_id = span.run_id;

        async move {
            let started = Instant::now();
            self.metrics.record_recovery_started();

            let mut tracker = StageTracker::new(run_id.as_str(), self.store.clone());
            let outcome = match self.run(trigger, &mut tracker).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let kind = e.kind();
                    let reason = e.to_string();
                    let stage = tracker.fail(&reason).await;
                    error!(
                        stage = stage.as_str(),
                        kind = kind.as_str(),
                        reason = %reason,
                        "Recovery failed"
                    );
                    RecoveryOutcome::Failed {
                        stage,
                        kind,
                        reason,
                    }
                }
            };

            info!(
                outcome = outcome.label(),
                elapsed_secs = started.elapsed().as_secs(),
                "Recovery finished"
            );
            self.metrics
                .record_recovery_outcome(&outcome, started.elapsed());
            outcome
        }
        .instrument(span.span())
        .await
    }

    async fn run(
        &self,
        trigger: &RecoveryTrigger,
        tracker: &mut StageTracker,
    ) -> Result<RecoveryOutcome, RecoveryError> {
        self.resume_pending_cleanup().await?;

        let checkpoint = self.store.load().await?;
        let instance_id = &trigger.instance.instance_id;
        if checkpoint.is_current(instance_id) {
            info!(instance_id = %instance_id, "Instance already recorded as current, skipping");
            return Ok(RecoveryOutcome::Skipped {
                instance_id: instance_id.clone(),
            });
        }

        let mut ctx = RecoveryContext::new(
            trigger,
            &checkpoint,
            self.config.controller.api_access,
            self.config.timing.deadline(),
        )?;
        let deadline = Deadline::new(ctx.deadline_budget);

        info!(
            replaced_instance_id = ?ctx.replaced_instance_id,
            floating_address = %ctx.floating_address,
            old_private_address = %ctx.old_private_address,
            new_private_address = %ctx.new_private_address(),
            api_access = %ctx.api_access,
            "Starting recovery"
        );

        self.addresses
            .assign(&ctx.floating_address, ctx.new_instance_id())
            .await?;
        tracker
            .advance(
                RecoveryStage::AddressAssigned,
                Some(ctx.floating_address.clone()),
            )
            .await;

        let side_task = self.spawn_burst_credits(ctx.new_instance_id());
        let result = self.run_with_address(&mut ctx, &deadline, tracker).await;
        self.join_side_task(side_task).await;

        result
    }

    /// Everything after the address is bound; the guard is reverted on
    /// every path out
    async fn run_with_address(
        &self,
        ctx: &mut RecoveryContext,
        deadline: &Deadline,
        tracker: &mut StageTracker,
    ) -> Result<RecoveryOutcome, RecoveryError> {
        let backup_age = self.check_backup(&ctx.old_private_address).await?;

        let grant = self.guard.open(&ctx.new_instance, ctx.api_access).await?;
        tracker
            .advance(RecoveryStage::GuardOpened, Some(grant.group_id.clone()))
            .await;

        let result = self.restore(ctx, backup_age, deadline, tracker).await;

        if let Err(e) = self.guard.revert(&grant).await {
            warn!(
                group_id = %grant.group_id,
                error = %e,
                "Could not revert ingress rule, the next run will retry"
            );
        }

        result
    }

    async fn restore(
        &self,
        ctx: &mut RecoveryContext,
        backup_age: u64,
        deadline: &Deadline,
        tracker: &mut StageTracker,
    ) -> Result<RecoveryOutcome, RecoveryError> {
        let credentials = Credentials::new(
            self.config.controller.username.clone(),
            self.config.password_for(ctx.new_private_address()),
        );
        let mut session = ControllerSession::new(self.api.clone(), ctx.api_address(), credentials);

        if !self.login(&mut session, ctx, deadline).await? {
            return self.handle_login_failure(ctx, tracker).await;
        }
        tracker.advance(RecoveryStage::Authenticated, None).await;

        let target_version = self.resolve_version(&ctx.old_private_address).await?;
        let artifact = BackupArtifact::for_address(&ctx.old_private_address, target_version, backup_age);
        tracker
            .advance(
                RecoveryStage::VersionResolved,
                Some(artifact.target_version.clone()),
            )
            .await;

        deadline.check()?;
        let bootstrap = self
            .bootstrap
            .run(&session, &artifact.target_version)
            .await?;
        if bootstrap == BootstrapResult::AlreadyDone {
            tracker
                .advance(
                    RecoveryStage::BootstrapComplete,
                    Some("already complete".to_string()),
                )
                .await;
        }

        let restorer = BackupRestorer::new(self.restore_settings(&artifact), self.metrics.clone());
        let waited = restorer
            .run(
                &mut session,
                RestoreState::initial(bootstrap),
                deadline,
                tracker,
            )
            .await?;
        ctx.add_restore_elapsed(waited);

        self.store
            .record_current(
                ctx.new_instance_id(),
                ctx.new_private_address(),
                &ctx.floating_address,
            )
            .await?;
        tracker
            .advance(RecoveryStage::Restored, Some(artifact.object_key))
            .await;

        info!(
            login_secs = ctx.login_elapsed().as_secs(),
            restore_secs = ctx.restore_elapsed().as_secs(),
            "New controller restored from backup"
        );
        Ok(RecoveryOutcome::Restored {
            path: RestorePath::Fresh,
        })
    }

    /// Retry login until it succeeds or the login window is spent
    async fn login(
        &self,
        session: &mut ControllerSession,
        ctx: &mut RecoveryContext,
        deadline: &Deadline,
    ) -> Result<bool, RecoveryError> {
        let mut budget = PollBudget::new(self.config.timing.login_timeout());

        while !budget.is_exhausted() {
            deadline.check()?;

            match session.authenticate().await {
                Ok(_) => {
                    self.metrics.record_login_attempt(true);
                    info!(
                        attempts = budget.waits() + 1,
                        waited_secs = budget.spent().as_secs(),
                        "Logged in to new controller"
                    );
                    ctx.add_login_elapsed(budget.spent());
                    return Ok(true);
                }
                Err(e) => {
                    self.metrics.record_login_attempt(false);
                    warn!(
                        address = %session.address(),
                        error = %e,
                        waited_secs = budget.spent().as_secs(),
                        "Login failed, controller may still be booting"
                    );
                    budget.wait(self.config.timing.login_retry_delay()).await;
                }
            }
        }

        ctx.add_login_elapsed(budget.spent());
        Ok(false)
    }

    /// The new controller never answered. If it already carries a version
    /// marker of its own, an earlier run restored it; otherwise stop it so
    /// the scaling group launches another.
    async fn handle_login_failure(
        &self,
        ctx: &RecoveryContext,
        tracker: &mut StageTracker,
    ) -> Result<RecoveryOutcome, RecoveryError> {
        let marker_key = version_object_key(ctx.new_private_address());
        let marker = self.artifacts.fetch(&marker_key).await;

        if let Ok(object) = &marker {
            if let Ok(version) = parse_target_version(&object.bytes) {
                info!(
                    marker = %marker_key,
                    version = %version,
                    "New controller already restored by an earlier run"
                );
                self.store
                    .record_current(
                        ctx.new_instance_id(),
                        ctx.new_private_address(),
                        &ctx.floating_address,
                    )
                    .await?;
                tracker
                    .advance(RecoveryStage::Restored, Some("prior run".to_string()))
                    .await;
                return Ok(RecoveryOutcome::Restored {
                    path: RestorePath::PriorRun,
                });
            }
        }

        if let Err(e) = &marker {
            debug!(marker = %marker_key, error = %e, "No version marker for new controller");
        }

        warn!(instance_id = %ctx.new_instance_id(), "Stopping unresponsive instance for replacement");
        if let Err(e) = self.instances.stop_instance(ctx.new_instance_id()).await {
            warn!(instance_id = %ctx.new_instance_id(), error = %e, "Could not stop instance");
        }

        Err(RecoveryError::InstanceUnrecoverable(format!(
            "no login to {} within {}s",
            ctx.api_address(),
            ctx.login_elapsed().as_secs()
        )))
    }

    /// Reject a missing or stale backup; returns its age in seconds
    async fn check_backup(&self, old_private_address: &str) -> Result<u64, RecoveryError> {
        let key = backup_object_key(old_private_address);
        let object = self.fetch_required(&key).await?;

        let age = object.age_at(unix_now());
        let max_age = self.config.backup.max_age_secs;
        if age >= max_age {
            return Err(RecoveryError::FatalInput(format!(
                "backup {key} is {age}s old, limit is {max_age}s"
            )));
        }

        debug!(key = %key, age_secs = age, "Backup is fresh");
        Ok(age)
    }

    async fn resolve_version(&self, old_private_address: &str) -> Result<String, RecoveryError> {
        let key = version_object_key(old_private_address);
        let object = self.fetch_required(&key).await?;
        let version = parse_target_version(&object.bytes)?;

        info!(key = %key, version = %version, "Resolved target version");
        Ok(version)
    }

    async fn fetch_required(&self, key: &str) -> Result<StoredObject, RecoveryError> {
        self.artifacts.fetch(key).await.map_err(|e| match e.kind {
            CloudErrorKind::NotFound => RecoveryError::FatalInput(format!("{key} not found")),
            _ => RecoveryError::Cloud(e),
        })
    }

    fn restore_settings(&self, artifact: &BackupArtifact) -> RestoreSettings {
        let account = &self.config.account;
        let timing = &self.config.timing;

        RestoreSettings {
            account: AccountProfile::new(
                account.name.clone(),
                account.cloud_account_number.clone(),
                &account.app_role_name,
                &account.ec2_role_name,
            ),
            request: RestoreRequest {
                account_name: account.name.clone(),
                file_name: artifact.object_key.clone(),
                bucket_name: self.config.backup.bucket.clone(),
            },
            customer_id: self.config.backup.customer_id.clone(),
            restore_wait: timing.restore_wait(),
            poll_delay: timing.restore_poll_delay(),
            retry_delay: timing.login_retry_delay(),
            reconnect_delay: timing.reconnect_delay(),
        }
    }

    /// Burst-credit mode is best effort; the handle is joined before the
    /// run returns
    fn spawn_burst_credits(&self, instance_id: &str) -> JoinHandle<Result<(), CloudError>> {
        let instances = self.instances.clone();
        let instance_id = instance_id.to_string();

        tokio::spawn(
            async move { instances.enable_unlimited_credits(&instance_id).await }
                .in_current_span(),
        )
    }

    async fn join_side_task(&self, mut handle: JoinHandle<Result<(), CloudError>>) {
        let limit: Duration = self.config.timing.side_task_join();

        match tokio::time::timeout(limit, &mut handle).await {
            Ok(Ok(Ok(()))) => debug!("Burst credit mode updated"),
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "Could not update burst credit mode");
                self.metrics.record_side_task_failure();
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Burst credit task panicked");
                self.metrics.record_side_task_failure();
            }
            Err(_) => {
                warn!(limit_secs = limit.as_secs(), "Burst credit task still running, abandoning it");
                handle.abort();
                self.metrics.record_side_task_failure();
            }
        }
    }
}
