use async_trait::async_trait;
use ctrl_ha_types::{Checkpoint, RecoveryStage};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::store::{now_secs, CheckpointStore, RecoveryTransition, StoreError};

// ═══════════════════════════════════════════════════════════════════════════
// SQLITE STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════

pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (creating if needed) the database at `db_path`
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        debug!(path = %db_path.as_ref().display(), "Opened checkpoint database");

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite database (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        // Every connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<(), StoreError> {
        let migrations = [
            include_str!("../migrations/001_create_checkpoint.sql"),
            include_str!("../migrations/002_create_transitions.sql"),
            include_str!("../migrations/003_index_transitions.sql"),
        ];
        for migration in migrations {
            sqlx::query(migration)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::DatabaseError(e.to_string()))?;
        }

        // The checkpoint is a single row that always exists
        sqlx::query("INSERT OR IGNORE INTO checkpoint (id, updated_at) VALUES (1, 0)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    fn row_to_checkpoint(row: &SqliteRow) -> Checkpoint {
        Checkpoint {
            current_instance_id: row.get("current_instance_id"),
            current_private_address: row.get("current_private_address"),
            floating_address: row.get("floating_address"),
            pending_grant_group: row.get("pending_grant_group"),
            updated_at: row.get::<i64, _>("updated_at").max(0) as u64,
        }
    }

    fn row_to_transition(row: &SqliteRow) -> Result<RecoveryTransition, StoreError> {
        Ok(RecoveryTransition {
            run_id: row.get("run_id"),
            from_stage: parse_stage(row.get("from_stage"))?,
            to_stage: parse_stage(row.get("to_stage"))?,
            timestamp: row.get::<i64, _>("timestamp").max(0) as u64,
            details: row.get("details"),
        })
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self) -> Result<Checkpoint, StoreError> {
        let row = sqlx::query("SELECT * FROM checkpoint WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        match row {
            Some(row) => Ok(Self::row_to_checkpoint(&row)),
            None => Err(StoreError::MissingCheckpoint),
        }
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE checkpoint
            SET current_instance_id = ?, current_private_address = ?,
                floating_address = ?, pending_grant_group = ?, updated_at = ?
            WHERE id = 1
            "#,
        )
        .bind(&checkpoint.current_instance_id)
        .bind(&checkpoint.current_private_address)
        .bind(&checkpoint.floating_address)
        .bind(&checkpoint.pending_grant_group)
        .bind(now_secs() as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn set_pending_grant(&self, group_id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE checkpoint SET pending_grant_group = ?, updated_at = ? WHERE id = 1")
            .bind(group_id)
            .bind(now_secs() as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn clear_pending_grant(&self) -> Result<(), StoreError> {
        sqlx::query("UPDATE checkpoint SET pending_grant_group = NULL, updated_at = ? WHERE id = 1")
            .bind(now_secs() as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn record_current(
        &self,
        instance_id: &str,
        private_address: &str,
        floating_address: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE checkpoint
            SET current_instance_id = ?, current_private_address = ?,
                floating_address = ?, updated_at = ?
            WHERE id = 1
            "#,
        )
        .bind(instance_id)
        .bind(private_address)
        .bind(floating_address)
        .bind(now_secs() as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn record_transition(&self, transition: &RecoveryTransition) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO recovery_transitions (
                run_id, from_stage, to_stage, timestamp, details
            ) VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transition.run_id)
        .bind(transition.from_stage.as_str())
        .bind(transition.to_stage.as_str())
        .bind(transition.timestamp as i64)
        .bind(&transition.details)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn get_history(&self, run_id: &str) -> Result<Vec<RecoveryTransition>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM recovery_transitions WHERE run_id = ? ORDER BY timestamp ASC, id ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

        rows.iter().map(Self::row_to_transition).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════

fn parse_stage(s: &str) -> Result<RecoveryStage, StoreError> {
    s.parse::<RecoveryStage>()
        .map_err(StoreError::SerializationError)
}

// ═══════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_fresh_database_has_empty_checkpoint() {
        let store = SqliteCheckpointStore::in_memory().await.unwrap();
        let checkpoint = store.load().await.unwrap();
        assert_eq!(checkpoint, Checkpoint::default());
    }

    #[tokio::test]
    async fn test_sqlite_save_and_load() {
        let store = SqliteCheckpointStore::in_memory().await.unwrap();
        let checkpoint = Checkpoint {
            current_instance_id: Some("i-old".to_string()),
            current_private_address: Some("10.0.0.5".to_string()),
            floating_address: Some("52.1.1.1".to_string()),
            pending_grant_group: None,
            updated_at: 0,
        };

        store.save(&checkpoint).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert!(loaded.is_current("i-old"));
        assert_eq!(loaded.current_private_address.as_deref(), Some("10.0.0.5"));
        assert!(loaded.updated_at > 0);
    }

    #[tokio::test]
    async fn test_sqlite_pending_grant() {
        let store = SqliteCheckpointStore::in_memory().await.unwrap();

        store.set_pending_grant("sg-1").await.unwrap();
        store
            .record_current("i-new", "10.0.0.9", "52.1.1.1")
            .await
            .unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.pending_grant_group.as_deref(), Some("sg-1"));
        assert!(loaded.is_current("i-new"));

        store.clear_pending_grant().await.unwrap();
        assert!(!store.load().await.unwrap().has_pending_grant());
    }

    #[tokio::test]
    async fn test_sqlite_transition_history() {
        let store = SqliteCheckpointStore::in_memory().await.unwrap();

        store
            .record_transition(&RecoveryTransition::new(
                "run-1",
                RecoveryStage::Start,
                RecoveryStage::AddressAssigned,
                10,
            ))
            .await
            .unwrap();
        store
            .record_transition(
                &RecoveryTransition::new(
                    "run-1",
                    RecoveryStage::AddressAssigned,
                    RecoveryStage::GuardOpened,
                    10,
                )
                .with_details("sg-1"),
            )
            .await
            .unwrap();

        let history = store.get_history("run-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].to_stage, RecoveryStage::AddressAssigned);
        assert_eq!(history[1].to_stage, RecoveryStage::GuardOpened);
        assert_eq!(history[1].details.as_deref(), Some("sg-1"));
        assert!(store.get_history("run-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctrl-ha.db");

        {
            let store = SqliteCheckpointStore::new(&path).await.unwrap();
            store.set_pending_grant("sg-7").await.unwrap();
            store.close().await;
        }

        let reopened = SqliteCheckpointStore::new(&path).await.unwrap();
        assert_eq!(
            reopened.load().await.unwrap().pending_grant_group.as_deref(),
            Some("sg-7")
        );
    }
}
