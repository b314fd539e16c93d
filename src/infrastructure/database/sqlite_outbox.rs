use crate::application::ports::outbox::Outbox;
use crate::domain::entities::{OperationDraft, PendingOperation};
use crate::domain::value_objects::LocalId;
use crate::infrastructure::database::mappers::{
    datetime_to_timestamp, pending_operation_from_row,
};
use crate::infrastructure::database::rows::OutboxRow;
use crate::shared::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

pub struct SqliteOutbox {
    pool: SqlitePool,
}

impl SqliteOutbox {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Outbox for SqliteOutbox {
    async fn enqueue(&self, draft: OperationDraft) -> Result<PendingOperation> {
        let mut tx = self.pool.begin().await?;

        // Dedup rule: only the latest intent for an entity is ever replayed.
        sqlx::query("DELETE FROM outbox_operations WHERE local_entity_id = ?1")
            .bind(draft.local_entity_id.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO outbox_operations (
                operation_type, entity_kind, local_entity_id, server_entity_id,
                parent_server_id, endpoint, http_method, payload, priority,
                retry_count, max_retries, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11)
            "#,
        )
        .bind(draft.operation_type.as_str())
        .bind(draft.entity_kind.as_str())
        .bind(draft.local_entity_id.to_string())
        .bind(draft.server_entity_id.map(|id| id.get()))
        .bind(draft.parent_server_id.map(|id| id.get()))
        .bind(&draft.endpoint)
        .bind(&draft.http_method)
        .bind(draft.payload.as_json().to_string())
        .bind(draft.priority())
        .bind(i64::from(draft.max_retries))
        .bind(datetime_to_timestamp(&Utc::now()))
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        let row = sqlx::query_as::<_, OutboxRow>("SELECT * FROM outbox_operations WHERE id = ?1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        pending_operation_from_row(row)
    }

    async fn next_batch(&self) -> Result<Vec<PendingOperation>> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            "SELECT * FROM outbox_operations ORDER BY priority ASC, created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(pending_operation_from_row).collect()
    }

    async fn record_failure(&self, id: i64, error: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_operations
            SET retry_count = retry_count + 1, last_error = ?2, last_attempt_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(datetime_to_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::NotFound(format!("No outbox operation {id}")));
        }
        Ok(())
    }

    async fn remove(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM outbox_operations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_for_entity(&self, local_id: &LocalId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM outbox_operations WHERE local_entity_id = ?1")
            .bind(local_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn pending_count(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM outbox_operations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn pending_count_for_entity(&self, local_id: &LocalId) -> Result<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM outbox_operations WHERE local_entity_id = ?1")
                .bind(local_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn has_pending(&self, local_id: &LocalId) -> Result<bool> {
        Ok(self.pending_count_for_entity(local_id).await? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::EntityRecord;
    use crate::domain::value_objects::{EntityKind, OperationType, SyncPayload};
    use crate::infrastructure::database::ConnectionPool;
    use serde_json::json;

    async fn setup_outbox() -> SqliteOutbox {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        SqliteOutbox::new(pool.get_pool().clone())
    }

    fn draft(kind: EntityKind, op: OperationType, name: &str) -> (OperationDraft, LocalId) {
        let record = EntityRecord::new_local(
            kind,
            SyncPayload::new(json!({"name": name})).unwrap(),
            None,
        );
        (OperationDraft::for_record(&record, op, 3), record.local_id)
    }

    #[tokio::test]
    async fn test_enqueue_dedups_per_entity_keeping_latest_payload() {
        let outbox = setup_outbox().await;
        let record = EntityRecord::new_local(
            EntityKind::Goal,
            SyncPayload::new(json!({"title": "first"})).unwrap(),
            None,
        );

        outbox
            .enqueue(OperationDraft::for_record(&record, OperationType::Update, 3))
            .await
            .unwrap();

        let mut newer = record.clone();
        newer.payload = SyncPayload::new(json!({"title": "second"})).unwrap();
        outbox
            .enqueue(OperationDraft::for_record(&newer, OperationType::Update, 3))
            .await
            .unwrap();

        let batch = outbox.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch[0].payload.get_field("title").and_then(|v| v.as_str()),
            Some("second")
        );
    }

    #[tokio::test]
    async fn test_next_batch_orders_toggles_creates_deletes() {
        let outbox = setup_outbox().await;
        let (delete_a, _) = draft(EntityKind::ShoppingList, OperationType::Delete, "a");
        let (create_b, _) = draft(EntityKind::ShoppingList, OperationType::Create, "b");
        let (toggle_c, _) = draft(EntityKind::ShoppingItem, OperationType::Toggle, "c");

        outbox.enqueue(delete_a).await.unwrap();
        outbox.enqueue(create_b).await.unwrap();
        outbox.enqueue(toggle_c).await.unwrap();

        let batch = outbox.next_batch().await.unwrap();
        let ordered: Vec<OperationType> = batch.iter().map(|op| op.operation_type).collect();
        assert_eq!(
            ordered,
            vec![
                OperationType::Toggle,
                OperationType::Create,
                OperationType::Delete
            ]
        );
    }

    #[tokio::test]
    async fn test_record_failure_increments_retry_count() {
        let outbox = setup_outbox().await;
        let (update, _) = draft(EntityKind::Asset, OperationType::Update, "tv");
        let op = outbox.enqueue(update).await.unwrap();
        assert!(op.can_retry());

        outbox.record_failure(op.id, "boom").await.unwrap();
        outbox.record_failure(op.id, "boom again").await.unwrap();
        outbox.record_failure(op.id, "still failing").await.unwrap();

        let batch = outbox.next_batch().await.unwrap();
        assert_eq!(batch[0].retry_count, 3);
        assert_eq!(batch[0].last_error.as_deref(), Some("still failing"));
        assert!(!batch[0].can_retry());
    }

    #[tokio::test]
    async fn test_pending_counts_per_entity() {
        let outbox = setup_outbox().await;
        let (update, local_id) = draft(EntityKind::Goal, OperationType::Update, "goal");
        outbox.enqueue(update).await.unwrap();

        assert_eq!(outbox.pending_count().await.unwrap(), 1);
        assert!(outbox.has_pending(&local_id).await.unwrap());
        assert_eq!(outbox.pending_count_for_entity(&local_id).await.unwrap(), 1);

        outbox.remove_for_entity(&local_id).await.unwrap();
        assert_eq!(outbox.pending_count().await.unwrap(), 0);
        assert!(!outbox.has_pending(&local_id).await.unwrap());
    }
}
