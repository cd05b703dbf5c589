use std::sync::Arc;

use ctrl_ha_store::{CheckpointStore, RecoveryTransition};
use ctrl_ha_types::RecoveryStage;
use tracing::{info, warn};

/// Current stage of one run, mirrored into the store's transition history
pub struct StageTracker {
    run_id: String,
    stage: RecoveryStage,
    store: Arc<dyn CheckpointStore>,
}

impl StageTracker {
    pub fn new(run_id: impl Into<String>, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            run_id: run_id.into(),
            stage: RecoveryStage::Start,
            store,
        }
    }

    pub fn stage(&self) -> RecoveryStage {
        self.stage
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Move to `to`; repeating the current stage records nothing.
    ///
    /// History is advisory: a failed write is logged and the run goes on.
    pub async fn advance(&mut self, to: RecoveryStage, details: Option<String>) {
        if to == self.stage {
            return;
        }

        info!(from = self.stage.as_str(), to = to.as_str(), "Recovery stage changed");

        let mut transition =
            RecoveryTransition::new(self.run_id.clone(), self.stage, to, unix_now());
        if let Some(details) = details {
            transition = transition.with_details(details);
        }

        if let Err(e) = self.store.record_transition(&transition).await {
            warn!(error = %e, to = to.as_str(), "Could not record stage transition");
        }
        self.stage = to;
    }

    /// Record a failure and return the stage the run had reached
    pub async fn fail(&mut self, reason: &str) -> RecoveryStage {
        let reached = self.stage;
        self.advance(RecoveryStage::Failed, Some(reason.to_string()))
            .await;
        reached
    }
}

pub(crate) fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
