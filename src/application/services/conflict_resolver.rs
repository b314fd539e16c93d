use crate::application::ports::local_store::LocalStore;
use crate::application::ports::outbox::Outbox;
use crate::application::ports::transport::PushOperationResult;
use crate::domain::entities::{
    ConflictChoice, ConflictSnapshot, EntityRecord, OperationDraft, PendingOperation, ServerRecord,
    SyncConflict,
};
use crate::domain::value_objects::{EntityKind, LocalId, OperationType};
use crate::shared::config::SyncConfig;
use crate::shared::error::{Result, SyncError};
use std::sync::Arc;

/// Decides the fate of diverged entities. Detection never merges: both sides
/// are retained on the record and surfaced; resolution happens only through
/// an explicit [`resolve`](ConflictResolver::resolve) call.
pub struct ConflictResolver {
    store: Arc<dyn LocalStore>,
    outbox: Arc<dyn Outbox>,
    config: SyncConfig,
}

impl ConflictResolver {
    pub fn new(store: Arc<dyn LocalStore>, outbox: Arc<dyn Outbox>, config: SyncConfig) -> Self {
        Self {
            store,
            outbox,
            config,
        }
    }

    /// A push result reported a version mismatch. The result carries no body,
    /// so only the server's version info is retained; the payload side of the
    /// snapshot arrives with the next pull.
    pub async fn on_push_conflict(
        &self,
        operation: &PendingOperation,
        result: &PushOperationResult,
    ) -> Result<SyncConflict> {
        let snapshot = ConflictSnapshot::version_only(result.version, result.server_updated_at);
        let record = self
            .store
            .mark_conflicted(operation.entity_kind, &operation.local_entity_id, snapshot)
            .await?;
        conflict_from(&record)
    }

    /// A pull delta touched an entity with a pending local edit.
    pub async fn on_pull_update_conflict(
        &self,
        record: &EntityRecord,
        incoming: &ServerRecord,
    ) -> Result<SyncConflict> {
        let snapshot = ConflictSnapshot::from_server_record(incoming);
        let record = self
            .store
            .mark_conflicted(record.kind, &record.local_id, snapshot)
            .await?;
        conflict_from(&record)
    }

    /// The server deleted an entity that still holds pending local state.
    pub async fn on_pull_delete_conflict(&self, record: &EntityRecord) -> Result<SyncConflict> {
        let record = self
            .store
            .mark_conflicted(
                record.kind,
                &record.local_id,
                ConflictSnapshot::deleted_on_server(),
            )
            .await?;
        conflict_from(&record)
    }

    /// Apply the user's verdict. Returns the resulting record, or `None` when
    /// the resolution removed it (took a server-side deletion).
    pub async fn resolve(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
        choice: ConflictChoice,
    ) -> Result<Option<EntityRecord>> {
        let record = self.store.get(kind, local_id).await?.ok_or_else(|| {
            SyncError::NotFound(format!("No {kind} entity with local id {local_id}"))
        })?;
        let snapshot = record.conflict.clone().ok_or_else(|| {
            SyncError::Validation(format!("Entity {local_id} is not conflicted"))
        })?;

        match choice {
            ConflictChoice::KeepMine => {
                let resolved = self
                    .store
                    .resolve_keep_local(kind, local_id, snapshot.version, snapshot.deleted)
                    .await?;
                self.requeue(&resolved).await?;
                Ok(Some(resolved))
            }
            ConflictChoice::Merge(payload) => {
                self.store
                    .resolve_keep_local(kind, local_id, snapshot.version, snapshot.deleted)
                    .await?;
                let resolved = self.store.stage_local_change(kind, local_id, payload).await?;
                self.requeue(&resolved).await?;
                Ok(Some(resolved))
            }
            ConflictChoice::TakeTheirs => {
                self.outbox.remove_for_entity(local_id).await?;
                if snapshot.deleted {
                    self.store.remove(kind, local_id).await?;
                    Ok(None)
                } else {
                    let resolved = self.store.resolve_take_server(kind, local_id).await?;
                    Ok(Some(resolved))
                }
            }
        }
    }

    /// Re-enqueue the kept local state at the server's version so the next
    /// push is expected to succeed.
    async fn requeue(&self, record: &EntityRecord) -> Result<()> {
        let operation = if record.server_id.is_none() {
            OperationType::Create
        } else {
            OperationType::Update
        };
        self.outbox
            .enqueue(OperationDraft::for_record(
                record,
                operation,
                self.config.max_retries,
            ))
            .await?;
        Ok(())
    }
}

fn conflict_from(record: &EntityRecord) -> Result<SyncConflict> {
    SyncConflict::from_record(record).ok_or_else(|| {
        SyncError::Internal(format!(
            "Entity {} was not marked conflicted",
            record.local_id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{ServerId, SyncPayload, SyncStatus};
    use crate::infrastructure::database::{ConnectionPool, SqliteLocalStore, SqliteOutbox};
    use chrono::Utc;
    use serde_json::json;

    struct Env {
        resolver: ConflictResolver,
        store: Arc<dyn LocalStore>,
        outbox: Arc<dyn Outbox>,
    }

    async fn setup() -> Env {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let store: Arc<dyn LocalStore> = Arc::new(SqliteLocalStore::new(pool.get_pool().clone()));
        let outbox: Arc<dyn Outbox> = Arc::new(SqliteOutbox::new(pool.get_pool().clone()));
        let resolver =
            ConflictResolver::new(store.clone(), outbox.clone(), SyncConfig::default());
        Env {
            resolver,
            store,
            outbox,
        }
    }

    async fn conflicted_goal(env: &Env) -> EntityRecord {
        let record = EntityRecord::new_local(
            EntityKind::Goal,
            SyncPayload::new(json!({"title": "Mine", "completed": false})).unwrap(),
            None,
        );
        env.store.insert_local(&record).await.unwrap();
        env.store
            .mark_synced(
                EntityKind::Goal,
                &record.local_id,
                ServerId::new(30).unwrap(),
                Some(1),
                None,
            )
            .await
            .unwrap();
        env.store
            .stage_local_change(
                EntityKind::Goal,
                &record.local_id,
                SyncPayload::new(json!({"title": "Mine edited", "completed": false})).unwrap(),
            )
            .await
            .unwrap();
        env.store
            .mark_conflicted(
                EntityKind::Goal,
                &record.local_id,
                ConflictSnapshot {
                    payload: Some(
                        SyncPayload::new(json!({"title": "Theirs", "completed": true})).unwrap(),
                    ),
                    version: Some(4),
                    updated_at: Some(Utc::now()),
                    deleted: false,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_keep_mine_requeues_update_at_server_version() {
        let env = setup().await;
        let record = conflicted_goal(&env).await;

        let resolved = env
            .resolver
            .resolve(EntityKind::Goal, &record.local_id, ConflictChoice::KeepMine)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.sync_status, SyncStatus::PendingUpdate);
        assert_eq!(resolved.version, 4);
        assert_eq!(
            resolved.payload.get_field("title").and_then(|v| v.as_str()),
            Some("Mine edited")
        );

        let batch = env.outbox.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].operation_type, OperationType::Update);
    }

    #[tokio::test]
    async fn test_take_theirs_applies_snapshot_and_drops_pending_operation() {
        let env = setup().await;
        let record = conflicted_goal(&env).await;
        env.outbox
            .enqueue(OperationDraft::for_record(&record, OperationType::Update, 3))
            .await
            .unwrap();

        let resolved = env
            .resolver
            .resolve(
                EntityKind::Goal,
                &record.local_id,
                ConflictChoice::TakeTheirs,
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.sync_status, SyncStatus::Synced);
        assert_eq!(
            resolved.payload.get_field("title").and_then(|v| v.as_str()),
            Some("Theirs")
        );
        assert_eq!(env.outbox.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_keep_mine_after_server_delete_recreates_entity() {
        let env = setup().await;
        let record = conflicted_goal(&env).await;
        env.store
            .mark_conflicted(
                EntityKind::Goal,
                &record.local_id,
                ConflictSnapshot::deleted_on_server(),
            )
            .await
            .unwrap();

        let resolved = env
            .resolver
            .resolve(EntityKind::Goal, &record.local_id, ConflictChoice::KeepMine)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.sync_status, SyncStatus::PendingCreate);
        assert!(resolved.server_id.is_none());

        let batch = env.outbox.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].operation_type, OperationType::Create);
    }

    #[tokio::test]
    async fn test_take_theirs_after_server_delete_removes_record() {
        let env = setup().await;
        let record = conflicted_goal(&env).await;
        env.store
            .mark_conflicted(
                EntityKind::Goal,
                &record.local_id,
                ConflictSnapshot::deleted_on_server(),
            )
            .await
            .unwrap();

        let resolved = env
            .resolver
            .resolve(
                EntityKind::Goal,
                &record.local_id,
                ConflictChoice::TakeTheirs,
            )
            .await
            .unwrap();

        assert!(resolved.is_none());
        assert!(env
            .store
            .get(EntityKind::Goal, &record.local_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_merge_stages_merged_payload() {
        let env = setup().await;
        let record = conflicted_goal(&env).await;

        let merged = SyncPayload::new(json!({"title": "Merged", "completed": true})).unwrap();
        let resolved = env
            .resolver
            .resolve(
                EntityKind::Goal,
                &record.local_id,
                ConflictChoice::Merge(merged),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.sync_status, SyncStatus::PendingUpdate);
        assert_eq!(resolved.version, 4);
        assert_eq!(
            resolved.payload.get_field("title").and_then(|v| v.as_str()),
            Some("Merged")
        );
    }
}
