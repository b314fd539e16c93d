use crate::application::ports::local_store::LocalStore;
use crate::application::ports::outbox::Outbox;
use crate::domain::entities::{
    DomainEntity, EntityRecord, OperationDraft, SyncConflict,
};
use crate::domain::value_objects::{EntityId, EntityKind, LocalId, OperationType, SyncPayload, SyncStatus};
use crate::shared::config::SyncConfig;
use crate::shared::error::{Result, SyncError};
use serde_json::{json, Value};
use std::sync::Arc;

/// UI-facing mutation staging: every local edit lands in the store and the
/// outbox together, so nothing is reported as saved without a durable queue
/// entry backing it.
pub struct MutationService {
    store: Arc<dyn LocalStore>,
    outbox: Arc<dyn Outbox>,
    config: SyncConfig,
}

impl MutationService {
    pub fn new(store: Arc<dyn LocalStore>, outbox: Arc<dyn Outbox>, config: SyncConfig) -> Self {
        Self {
            store,
            outbox,
            config,
        }
    }

    pub async fn create<E: DomainEntity>(
        &self,
        entity: &E,
        parent: Option<EntityId>,
    ) -> Result<EntityRecord> {
        let payload = entity.to_payload()?;
        let record = EntityRecord::new_local(E::KIND, payload, parent);
        self.store.insert_local(&record).await?;
        self.outbox
            .enqueue(OperationDraft::for_record(
                &record,
                OperationType::Create,
                self.config.max_retries,
            ))
            .await?;
        Ok(record)
    }

    pub async fn update<E: DomainEntity>(
        &self,
        local_id: &LocalId,
        entity: &E,
    ) -> Result<EntityRecord> {
        let payload = entity.to_payload()?;
        let record = self
            .store
            .stage_local_change(E::KIND, local_id, payload)
            .await?;

        // An entity the server has never seen replays as a create carrying
        // the full latest payload.
        let operation = if record.server_id.is_none() {
            OperationType::Create
        } else {
            OperationType::Update
        };
        self.outbox
            .enqueue(OperationDraft::for_record(
                &record,
                operation,
                self.config.max_retries,
            ))
            .await?;
        Ok(record)
    }

    /// Delete an entity and, for owning kinds, its children. The fan-out is
    /// explicit: child deletes are staged before the parent so the replay
    /// order never deletes a parent out from under its items.
    pub async fn delete(&self, kind: EntityKind, local_id: &LocalId) -> Result<()> {
        let record = self.store.get(kind, local_id).await?.ok_or_else(|| {
            SyncError::NotFound(format!("No {kind} entity with local id {local_id}"))
        })?;

        if let Some(child_kind) = kind.child_kind() {
            let children = self
                .store
                .list_children(child_kind, local_id, record.server_id)
                .await?;
            for child in children {
                // A conflicted child keeps its conflict; the server-side
                // cascade will surface it as deleted on the next pull.
                if child.sync_status == SyncStatus::Conflicted {
                    tracing::warn!(
                        target: "sync::mutations",
                        entity = %child.local_id,
                        "skipping conflicted child during cascade delete"
                    );
                    continue;
                }
                self.delete_record(child_kind, &child).await?;
            }
        }

        self.delete_record(kind, &record).await
    }

    async fn delete_record(&self, kind: EntityKind, record: &EntityRecord) -> Result<()> {
        // Never synced: the server has nothing to delete, cancel outright.
        if record.sync_status == SyncStatus::PendingCreate {
            self.outbox.remove_for_entity(&record.local_id).await?;
            self.store.remove(kind, &record.local_id).await?;
            return Ok(());
        }

        let staged = self.store.stage_local_delete(kind, &record.local_id).await?;
        self.outbox
            .enqueue(OperationDraft::for_record(
                &staged,
                OperationType::Delete,
                self.config.max_retries,
            ))
            .await?;
        Ok(())
    }

    /// Set a boolean field (item checked, task done). The queued operation
    /// carries the absolute target state, so replaying only the latest toggle
    /// is always correct.
    pub async fn toggle(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
        field: &str,
        value: bool,
    ) -> Result<EntityRecord> {
        let record = self.store.get(kind, local_id).await?.ok_or_else(|| {
            SyncError::NotFound(format!("No {kind} entity with local id {local_id}"))
        })?;

        let mut payload = record.payload.clone();
        payload
            .set_field(field, Value::Bool(value))
            .map_err(SyncError::Validation)?;
        let staged = self.store.stage_local_change(kind, local_id, payload).await?;

        if staged.server_id.is_none() {
            // Fold the toggle into the pending create.
            self.outbox
                .enqueue(OperationDraft::for_record(
                    &staged,
                    OperationType::Create,
                    self.config.max_retries,
                ))
                .await?;
        } else {
            let mut draft =
                OperationDraft::for_record(&staged, OperationType::Toggle, self.config.max_retries);
            draft.payload = SyncPayload::new(json!({ "field": field, "value": value }))
                .map_err(SyncError::Validation)?;
            self.outbox.enqueue(draft).await?;
        }
        Ok(staged)
    }

    pub async fn get(&self, kind: EntityKind, local_id: &LocalId) -> Result<Option<EntityRecord>> {
        self.store.get(kind, local_id).await
    }

    pub async fn list_active(&self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        self.store.list_active(kind).await
    }

    pub async fn pending_count(&self) -> Result<u64> {
        self.outbox.pending_count().await
    }

    pub async fn has_pending(&self, local_id: &LocalId) -> Result<bool> {
        self.outbox.has_pending(local_id).await
    }

    pub async fn conflicts(&self) -> Result<Vec<SyncConflict>> {
        let records = self.store.list_conflicted().await?;
        Ok(records
            .iter()
            .filter_map(SyncConflict::from_record)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ShoppingItem, ShoppingList};
    use crate::domain::value_objects::ServerId;
    use crate::infrastructure::database::{ConnectionPool, SqliteLocalStore, SqliteOutbox};

    async fn setup_service() -> (MutationService, Arc<dyn LocalStore>, Arc<dyn Outbox>) {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let store: Arc<dyn LocalStore> = Arc::new(SqliteLocalStore::new(pool.get_pool().clone()));
        let outbox: Arc<dyn Outbox> = Arc::new(SqliteOutbox::new(pool.get_pool().clone()));
        let service = MutationService::new(store.clone(), outbox.clone(), SyncConfig::default());
        (service, store, outbox)
    }

    fn groceries() -> ShoppingList {
        ShoppingList {
            name: "Groceries".to_string(),
            notes: None,
            archived: false,
        }
    }

    #[tokio::test]
    async fn test_create_stages_record_and_queues_create() {
        let (service, store, outbox) = setup_service().await;

        let record = service.create(&groceries(), None).await.unwrap();

        assert_eq!(record.sync_status, SyncStatus::PendingCreate);
        assert!(record.server_id.is_none());

        let stored = store
            .get(EntityKind::ShoppingList, &record.local_id)
            .await
            .unwrap();
        assert!(stored.is_some());

        let batch = outbox.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].operation_type, OperationType::Create);
    }

    #[tokio::test]
    async fn test_double_update_leaves_one_operation_with_latest_payload() {
        let (service, store, outbox) = setup_service().await;
        let record = service.create(&groceries(), None).await.unwrap();
        store
            .mark_synced(
                EntityKind::ShoppingList,
                &record.local_id,
                ServerId::new(11).unwrap(),
                Some(1),
                None,
            )
            .await
            .unwrap();
        outbox.remove_for_entity(&record.local_id).await.unwrap();

        let mut list = groceries();
        list.name = "First edit".to_string();
        service.update(&record.local_id, &list).await.unwrap();
        list.name = "Second edit".to_string();
        service.update(&record.local_id, &list).await.unwrap();

        let batch = outbox.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].operation_type, OperationType::Update);
        assert_eq!(
            batch[0].payload.get_field("name").and_then(|v| v.as_str()),
            Some("Second edit")
        );
    }

    #[tokio::test]
    async fn test_update_of_offline_created_entity_replays_as_create() {
        let (service, _, outbox) = setup_service().await;
        let record = service.create(&groceries(), None).await.unwrap();

        let mut list = groceries();
        list.name = "Renamed before sync".to_string();
        let updated = service.update(&record.local_id, &list).await.unwrap();

        assert_eq!(updated.sync_status, SyncStatus::PendingCreate);
        let batch = outbox.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].operation_type, OperationType::Create);
        assert_eq!(
            batch[0].payload.get_field("name").and_then(|v| v.as_str()),
            Some("Renamed before sync")
        );
    }

    #[tokio::test]
    async fn test_delete_of_never_synced_entity_cancels_outright() {
        let (service, store, outbox) = setup_service().await;
        let record = service.create(&groceries(), None).await.unwrap();

        service
            .delete(EntityKind::ShoppingList, &record.local_id)
            .await
            .unwrap();

        assert!(store
            .get(EntityKind::ShoppingList, &record.local_id)
            .await
            .unwrap()
            .is_none());
        assert_eq!(outbox.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_of_synced_entity_queues_delete_and_hides_record() {
        let (service, store, outbox) = setup_service().await;
        let record = service.create(&groceries(), None).await.unwrap();
        store
            .mark_synced(
                EntityKind::ShoppingList,
                &record.local_id,
                ServerId::new(4).unwrap(),
                Some(1),
                None,
            )
            .await
            .unwrap();
        outbox.remove_for_entity(&record.local_id).await.unwrap();

        service
            .delete(EntityKind::ShoppingList, &record.local_id)
            .await
            .unwrap();

        let active = service.list_active(EntityKind::ShoppingList).await.unwrap();
        assert!(active.is_empty());

        let batch = outbox.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].operation_type, OperationType::Delete);
    }

    #[tokio::test]
    async fn test_delete_of_list_fans_out_to_items_before_parent() {
        let (service, store, outbox) = setup_service().await;
        let list = service.create(&groceries(), None).await.unwrap();
        store
            .mark_synced(
                EntityKind::ShoppingList,
                &list.local_id,
                ServerId::new(8).unwrap(),
                Some(1),
                None,
            )
            .await
            .unwrap();
        outbox.remove_for_entity(&list.local_id).await.unwrap();

        let item = ShoppingItem {
            name: "Milk".to_string(),
            quantity: None,
            unit: None,
            checked: false,
        };
        let item_record = service
            .create(&item, Some(EntityId::Local(list.local_id)))
            .await
            .unwrap();
        store
            .mark_synced(
                EntityKind::ShoppingItem,
                &item_record.local_id,
                ServerId::new(9).unwrap(),
                Some(1),
                None,
            )
            .await
            .unwrap();
        outbox.remove_for_entity(&item_record.local_id).await.unwrap();

        service
            .delete(EntityKind::ShoppingList, &list.local_id)
            .await
            .unwrap();

        let batch = outbox.next_batch().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch
            .iter()
            .all(|op| op.operation_type == OperationType::Delete));
        // Child delete replays before the parent delete.
        assert_eq!(batch[0].local_entity_id, item_record.local_id);
        assert_eq!(batch[1].local_entity_id, list.local_id);
    }

    #[tokio::test]
    async fn test_toggle_on_synced_entity_queues_absolute_state() {
        let (service, store, outbox) = setup_service().await;
        let item = ShoppingItem {
            name: "Milk".to_string(),
            quantity: Some(1.0),
            unit: Some("l".to_string()),
            checked: false,
        };
        let record = service.create(&item, None).await.unwrap();
        store
            .mark_synced(
                EntityKind::ShoppingItem,
                &record.local_id,
                ServerId::new(21).unwrap(),
                Some(1),
                None,
            )
            .await
            .unwrap();
        outbox.remove_for_entity(&record.local_id).await.unwrap();

        let toggled = service
            .toggle(EntityKind::ShoppingItem, &record.local_id, "checked", true)
            .await
            .unwrap();

        assert_eq!(
            toggled.payload.get_field("checked"),
            Some(&Value::Bool(true))
        );
        let batch = outbox.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].operation_type, OperationType::Toggle);
        assert_eq!(
            batch[0].payload.get_field("value"),
            Some(&Value::Bool(true))
        );
    }
}
