use async_trait::async_trait;
use ctrl_ha_types::{Checkpoint, RecoveryStage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

// ═══════════════════════════════════════════════════════════════════════════
// CORE TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// One stage change of a recovery run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecoveryTransition {
    pub run_id: String,
    pub from_stage: RecoveryStage,
    pub to_stage: RecoveryStage,
    pub timestamp: u64,
    pub details: Option<String>,
}

impl RecoveryTransition {
    pub fn new(
        run_id: impl Into<String>,
        from_stage: RecoveryStage,
        to_stage: RecoveryStage,
        timestamp: u64,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            from_stage,
            to_stage,
            timestamp,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub(crate) fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

// ═══════════════════════════════════════════════════════════════════════════
// ERROR TYPES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("checkpoint row missing")]
    MissingCheckpoint,
}

// ═══════════════════════════════════════════════════════════════════════════
// STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════

/// Durable checkpoint storage.
///
/// Each mutation is atomic: a concurrent reader sees the record before or
/// after it, never a mix.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the current checkpoint; an empty store yields the default record
    async fn load(&self) -> Result<Checkpoint, StoreError>;

    /// Replace the whole record
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;

    /// Remember an owned ingress grant that must be reverted
    async fn set_pending_grant(&self, group_id: &str) -> Result<(), StoreError>;

    /// Forget the owned ingress grant after its revert
    async fn clear_pending_grant(&self) -> Result<(), StoreError>;

    /// Record a new current controller, leaving any pending grant as is
    async fn record_current(
        &self,
        instance_id: &str,
        private_address: &str,
        floating_address: &str,
    ) -> Result<(), StoreError>;

    /// Append a stage transition to a run's history
    async fn record_transition(&self, transition: &RecoveryTransition) -> Result<(), StoreError>;

    /// Transitions of one run, oldest first
    async fn get_history(&self, run_id: &str) -> Result<Vec<RecoveryTransition>, StoreError>;
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE (for testing)
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    checkpoint: RwLock<Checkpoint>,
    transitions: RwLock<HashMap<String, Vec<RecoveryTransition>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            checkpoint: RwLock::new(checkpoint),
            transitions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of recorded transitions across all runs (for testing)
    pub async fn transition_count(&self) -> usize {
        self.transitions.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self) -> Result<Checkpoint, StoreError> {
        Ok(self.checkpoint.read().await.clone())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let mut current = self.checkpoint.write().await;
        *current = checkpoint.clone();
        current.updated_at = now_secs();
        Ok(())
    }

    async fn set_pending_grant(&self, group_id: &str) -> Result<(), StoreError> {
        let mut current = self.checkpoint.write().await;
        current.pending_grant_group = Some(group_id.to_string());
        current.updated_at = now_secs();
        Ok(())
    }

    async fn clear_pending_grant(&self) -> Result<(), StoreError> {
        let mut current = self.checkpoint.write().await;
        current.pending_grant_group = None;
        current.updated_at = now_secs();
        Ok(())
    }

    async fn record_current(
        &self,
        instance_id: &str,
        private_address: &str,
        floating_address: &str,
    ) -> Result<(), StoreError> {
        let mut current = self.checkpoint.write().await;
        current.current_instance_id = Some(instance_id.to_string());
        current.current_private_address = Some(private_address.to_string());
        current.floating_address = Some(floating_address.to_string());
        current.updated_at = now_secs();
        Ok(())
    }

    async fn record_transition(&self, transition: &RecoveryTransition) -> Result<(), StoreError> {
        self.transitions
            .write()
            .await
            .entry(transition.run_id.clone())
            .or_default()
            .push(transition.clone());
        Ok(())
    }

    async fn get_history(&self, run_id: &str) -> Result<Vec<RecoveryTransition>, StoreError> {
        Ok(self
            .transitions
            .read()
            .await
            .get(run_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store_loads_default() {
        let store = InMemoryCheckpointStore::new();
        let checkpoint = store.load().await.unwrap();
        assert_eq!(checkpoint.current_instance_id, None);
        assert!(!checkpoint.has_pending_grant());
    }

    #[tokio::test]
    async fn test_pending_grant_lifecycle() {
        let store = InMemoryCheckpointStore::new();

        store.set_pending_grant("sg-1").await.unwrap();
        assert_eq!(
            store.load().await.unwrap().pending_grant_group.as_deref(),
            Some("sg-1")
        );

        store.clear_pending_grant().await.unwrap();
        assert!(!store.load().await.unwrap().has_pending_grant());
    }

    #[tokio::test]
    async fn test_record_current_keeps_pending_grant() {
        let store = InMemoryCheckpointStore::new();
        store.set_pending_grant("sg-1").await.unwrap();

        store
            .record_current("i-new", "10.0.0.9", "52.1.1.1")
            .await
            .unwrap();

        let checkpoint = store.load().await.unwrap();
        assert!(checkpoint.is_current("i-new"));
        assert_eq!(checkpoint.current_private_address.as_deref(), Some("10.0.0.9"));
        assert_eq!(checkpoint.pending_grant_group.as_deref(), Some("sg-1"));
        assert!(checkpoint.updated_at > 0);
    }

    #[tokio::test]
    async fn test_history_is_per_run() {
        let store = InMemoryCheckpointStore::new();
        store
            .record_transition(&RecoveryTransition::new(
                "run-1",
                RecoveryStage::Start,
                RecoveryStage::AddressAssigned,
                1,
            ))
            .await
            .unwrap();
        store
            .record_transition(
                &RecoveryTransition::new(
                    "run-1",
                    RecoveryStage::AddressAssigned,
                    RecoveryStage::Failed,
                    2,
                )
                .with_details("backup too old"),
            )
            .await
            .unwrap();
        store
            .record_transition(&RecoveryTransition::new(
                "run-2",
                RecoveryStage::Start,
                RecoveryStage::Failed,
                3,
            ))
            .await
            .unwrap();

        let history = store.get_history("run-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].to_stage, RecoveryStage::Failed);
        assert_eq!(history[1].details.as_deref(), Some("backup too old"));
        assert!(store.get_history("run-3").await.unwrap().is_empty());
        assert_eq!(store.transition_count().await, 3);
    }
}
