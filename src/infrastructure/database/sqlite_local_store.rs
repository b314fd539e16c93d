use crate::application::ports::local_store::{LocalStore, ServerUpsert};
use crate::domain::entities::{ConflictSnapshot, EntityRecord, ServerRecord};
use crate::domain::value_objects::{EntityKind, LocalId, ServerId, SyncPayload, SyncStatus};
use crate::infrastructure::database::mappers::{datetime_to_timestamp, entity_record_from_row};
use crate::infrastructure::database::rows::EntityRow;
use crate::shared::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_row(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
    ) -> Result<Option<EntityRow>> {
        let row = sqlx::query_as::<_, EntityRow>(
            "SELECT * FROM entities WHERE entity_kind = ?1 AND local_id = ?2",
        )
        .bind(kind.as_str())
        .bind(local_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn fetch_required(&self, kind: EntityKind, local_id: &LocalId) -> Result<EntityRecord> {
        let row = self.fetch_row(kind, local_id).await?.ok_or_else(|| {
            SyncError::NotFound(format!("No {kind} entity with local id {local_id}"))
        })?;
        entity_record_from_row(row)
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn insert_local(&self, record: &EntityRecord) -> Result<()> {
        let (parent_local, parent_server) = match &record.parent {
            Some(parent) => (
                parent.local().map(|id| id.to_string()),
                parent.remote().map(|id| id.get()),
            ),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO entities (
                local_id, entity_kind, server_id, version, sync_status,
                parent_local_id, parent_server_id, payload,
                local_updated_at, last_synced_at, server_updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(record.local_id.to_string())
        .bind(record.kind.as_str())
        .bind(record.server_id.map(|id| id.get()))
        .bind(record.version)
        .bind(record.sync_status.as_str())
        .bind(parent_local)
        .bind(parent_server)
        .bind(record.payload.as_json().to_string())
        .bind(datetime_to_timestamp(&record.local_updated_at))
        .bind(record.last_synced_at.as_ref().map(datetime_to_timestamp))
        .bind(record.server_updated_at.as_ref().map(datetime_to_timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, kind: EntityKind, local_id: &LocalId) -> Result<Option<EntityRecord>> {
        self.fetch_row(kind, local_id)
            .await?
            .map(entity_record_from_row)
            .transpose()
    }

    async fn find_by_server_id(
        &self,
        kind: EntityKind,
        server_id: ServerId,
    ) -> Result<Option<EntityRecord>> {
        let row = sqlx::query_as::<_, EntityRow>(
            "SELECT * FROM entities WHERE entity_kind = ?1 AND server_id = ?2",
        )
        .bind(kind.as_str())
        .bind(server_id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(entity_record_from_row).transpose()
    }

    async fn list_active(&self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT * FROM entities
            WHERE entity_kind = ?1 AND sync_status != 'pending_delete'
            ORDER BY local_updated_at DESC
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(entity_record_from_row).collect()
    }

    async fn list_pending(&self) -> Result<Vec<EntityRecord>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT * FROM entities
            WHERE sync_status IN ('pending_create', 'pending_update', 'pending_delete')
            ORDER BY local_updated_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(entity_record_from_row).collect()
    }

    async fn list_children(
        &self,
        child_kind: EntityKind,
        parent_local_id: &LocalId,
        parent_server_id: Option<ServerId>,
    ) -> Result<Vec<EntityRecord>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT * FROM entities
            WHERE entity_kind = ?1
              AND (parent_local_id = ?2 OR (?3 IS NOT NULL AND parent_server_id = ?3))
            ORDER BY local_updated_at ASC
            "#,
        )
        .bind(child_kind.as_str())
        .bind(parent_local_id.to_string())
        .bind(parent_server_id.map(|id| id.get()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(entity_record_from_row).collect()
    }

    async fn list_conflicted(&self) -> Result<Vec<EntityRecord>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            "SELECT * FROM entities WHERE sync_status = 'conflicted' ORDER BY local_updated_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(entity_record_from_row).collect()
    }

    async fn stage_local_change(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
        payload: SyncPayload,
    ) -> Result<EntityRecord> {
        let current = self.fetch_required(kind, local_id).await?;

        let next_status = match current.sync_status {
            SyncStatus::Conflicted => {
                return Err(SyncError::Validation(format!(
                    "Entity {local_id} is conflicted; resolve the conflict first"
                )));
            }
            SyncStatus::PendingDelete => {
                return Err(SyncError::Validation(format!(
                    "Entity {local_id} is pending delete and cannot be edited"
                )));
            }
            _ if current.server_id.is_none() => SyncStatus::PendingCreate,
            _ => SyncStatus::PendingUpdate,
        };

        sqlx::query(
            r#"
            UPDATE entities
            SET payload = ?3, sync_status = ?4, local_updated_at = ?5, sync_error = NULL
            WHERE entity_kind = ?1 AND local_id = ?2
            "#,
        )
        .bind(kind.as_str())
        .bind(local_id.to_string())
        .bind(payload.as_json().to_string())
        .bind(next_status.as_str())
        .bind(datetime_to_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;

        self.fetch_required(kind, local_id).await
    }

    async fn stage_local_delete(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
    ) -> Result<EntityRecord> {
        let current = self.fetch_required(kind, local_id).await?;
        if current.sync_status == SyncStatus::Conflicted {
            return Err(SyncError::Validation(format!(
                "Entity {local_id} is conflicted; resolve the conflict first"
            )));
        }

        sqlx::query(
            r#"
            UPDATE entities
            SET sync_status = 'pending_delete', local_updated_at = ?3, sync_error = NULL
            WHERE entity_kind = ?1 AND local_id = ?2
            "#,
        )
        .bind(kind.as_str())
        .bind(local_id.to_string())
        .bind(datetime_to_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;

        self.fetch_required(kind, local_id).await
    }

    async fn mark_synced(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
        server_id: ServerId,
        version: Option<i64>,
        server_updated_at: Option<DateTime<Utc>>,
    ) -> Result<EntityRecord> {
        let result = sqlx::query(
            r#"
            UPDATE entities
            SET server_id = ?3,
                version = COALESCE(?4, version),
                sync_status = 'synced',
                last_synced_at = ?5,
                server_updated_at = COALESCE(?6, server_updated_at),
                conflict_payload = NULL,
                conflict_version = NULL,
                conflict_updated_at = NULL,
                conflict_deleted = 0,
                sync_error = NULL
            WHERE entity_kind = ?1 AND local_id = ?2
            "#,
        )
        .bind(kind.as_str())
        .bind(local_id.to_string())
        .bind(server_id.get())
        .bind(version)
        .bind(datetime_to_timestamp(&Utc::now()))
        .bind(server_updated_at.as_ref().map(datetime_to_timestamp))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::NotFound(format!(
                "No {kind} entity with local id {local_id}"
            )));
        }

        self.fetch_required(kind, local_id).await
    }

    async fn mark_conflicted(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
        snapshot: ConflictSnapshot,
    ) -> Result<EntityRecord> {
        // A later snapshot refresh may carry only partial server info; keep
        // what is already retained rather than erasing it.
        let result = sqlx::query(
            r#"
            UPDATE entities
            SET sync_status = 'conflicted',
                conflict_payload = COALESCE(?3, conflict_payload),
                conflict_version = COALESCE(?4, conflict_version),
                conflict_updated_at = COALESCE(?5, conflict_updated_at),
                conflict_deleted = ?6
            WHERE entity_kind = ?1 AND local_id = ?2
            "#,
        )
        .bind(kind.as_str())
        .bind(local_id.to_string())
        .bind(snapshot.payload.as_ref().map(|p| p.as_json().to_string()))
        .bind(snapshot.version)
        .bind(snapshot.updated_at.as_ref().map(datetime_to_timestamp))
        .bind(snapshot.deleted)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::NotFound(format!(
                "No {kind} entity with local id {local_id}"
            )));
        }

        self.fetch_required(kind, local_id).await
    }

    async fn record_sync_error(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
        message: &str,
    ) -> Result<EntityRecord> {
        let result = sqlx::query(
            "UPDATE entities SET sync_error = ?3 WHERE entity_kind = ?1 AND local_id = ?2",
        )
        .bind(kind.as_str())
        .bind(local_id.to_string())
        .bind(message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::NotFound(format!(
                "No {kind} entity with local id {local_id}"
            )));
        }

        self.fetch_required(kind, local_id).await
    }

    async fn resolve_keep_local(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
        server_version: Option<i64>,
        server_deleted: bool,
    ) -> Result<EntityRecord> {
        let current = self.fetch_required(kind, local_id).await?;
        if current.sync_status != SyncStatus::Conflicted {
            return Err(SyncError::Validation(format!(
                "Entity {local_id} is not conflicted"
            )));
        }

        if server_deleted {
            // The server dropped the entity; keeping the local state means
            // re-creating it from scratch.
            sqlx::query(
                r#"
                UPDATE entities
                SET server_id = NULL,
                    version = 1,
                    sync_status = 'pending_create',
                    local_updated_at = ?3,
                    conflict_payload = NULL,
                    conflict_version = NULL,
                    conflict_updated_at = NULL,
                    conflict_deleted = 0,
                    sync_error = NULL
                WHERE entity_kind = ?1 AND local_id = ?2
                "#,
            )
            .bind(kind.as_str())
            .bind(local_id.to_string())
            .bind(datetime_to_timestamp(&Utc::now()))
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE entities
                SET version = COALESCE(?3, version),
                    sync_status = 'pending_update',
                    local_updated_at = ?4,
                    conflict_payload = NULL,
                    conflict_version = NULL,
                    conflict_updated_at = NULL,
                    conflict_deleted = 0,
                    sync_error = NULL
                WHERE entity_kind = ?1 AND local_id = ?2
                "#,
            )
            .bind(kind.as_str())
            .bind(local_id.to_string())
            .bind(server_version)
            .bind(datetime_to_timestamp(&Utc::now()))
            .execute(&self.pool)
            .await?;
        }

        self.fetch_required(kind, local_id).await
    }

    async fn resolve_take_server(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
    ) -> Result<EntityRecord> {
        let current = self.fetch_required(kind, local_id).await?;
        if current.sync_status != SyncStatus::Conflicted {
            return Err(SyncError::Validation(format!(
                "Entity {local_id} is not conflicted"
            )));
        }
        let snapshot = current.conflict.as_ref().ok_or_else(|| {
            SyncError::Validation(format!("Entity {local_id} has no conflict snapshot"))
        })?;
        if snapshot.deleted {
            return Err(SyncError::Validation(format!(
                "Entity {local_id} was deleted on the server; remove it instead"
            )));
        }
        let payload = snapshot.payload.as_ref().ok_or_else(|| {
            SyncError::Validation(format!(
                "No server snapshot for entity {local_id}; sync to fetch it first"
            ))
        })?;

        sqlx::query(
            r#"
            UPDATE entities
            SET payload = ?3,
                version = COALESCE(?4, version),
                server_updated_at = COALESCE(?5, server_updated_at),
                sync_status = 'synced',
                last_synced_at = ?6,
                conflict_payload = NULL,
                conflict_version = NULL,
                conflict_updated_at = NULL,
                conflict_deleted = 0
            WHERE entity_kind = ?1 AND local_id = ?2
            "#,
        )
        .bind(kind.as_str())
        .bind(local_id.to_string())
        .bind(payload.as_json().to_string())
        .bind(snapshot.version)
        .bind(snapshot.updated_at.as_ref().map(datetime_to_timestamp))
        .bind(datetime_to_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;

        self.fetch_required(kind, local_id).await
    }

    async fn remove(&self, kind: EntityKind, local_id: &LocalId) -> Result<()> {
        sqlx::query("DELETE FROM entities WHERE entity_kind = ?1 AND local_id = ?2")
            .bind(kind.as_str())
            .bind(local_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reparent(
        &self,
        child_kind: EntityKind,
        parent_local_id: &LocalId,
        parent_server_id: ServerId,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE entities
            SET parent_server_id = ?3, parent_local_id = NULL
            WHERE entity_kind = ?1 AND parent_local_id = ?2
            "#,
        )
        .bind(child_kind.as_str())
        .bind(parent_local_id.to_string())
        .bind(parent_server_id.get())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_from_server(
        &self,
        kind: EntityKind,
        incoming: &ServerRecord,
    ) -> Result<ServerUpsert> {
        // Match by local id first: an offline-created entity whose create
        // landed server-side but lost its ack reconciles here instead of
        // turning into a duplicate row.
        let mut existing = None;
        if let Some(local_id) = &incoming.local_id {
            existing = self.fetch_row(kind, local_id).await?;
        }
        if existing.is_none() {
            existing = sqlx::query_as::<_, EntityRow>(
                "SELECT * FROM entities WHERE entity_kind = ?1 AND server_id = ?2",
            )
            .bind(kind.as_str())
            .bind(incoming.server_id.get())
            .fetch_optional(&self.pool)
            .await?;
        }

        let Some(row) = existing else {
            let local_id = incoming.local_id.unwrap_or_else(LocalId::generate);
            let now = datetime_to_timestamp(&Utc::now());
            sqlx::query(
                r#"
                INSERT INTO entities (
                    local_id, entity_kind, server_id, version, sync_status,
                    parent_local_id, parent_server_id, payload,
                    local_updated_at, last_synced_at, server_updated_at
                ) VALUES (?1, ?2, ?3, ?4, 'synced', NULL, ?5, ?6, ?7, ?7, ?8)
                "#,
            )
            .bind(local_id.to_string())
            .bind(kind.as_str())
            .bind(incoming.server_id.get())
            .bind(incoming.version)
            .bind(incoming.parent_server_id.map(|id| id.get()))
            .bind(incoming.data.as_json().to_string())
            .bind(now)
            .bind(datetime_to_timestamp(&incoming.updated_at))
            .execute(&self.pool)
            .await?;
            return Ok(ServerUpsert::Inserted { local_id });
        };

        let record = entity_record_from_row(row)?;

        if record.sync_status != SyncStatus::Synced {
            return Ok(ServerUpsert::PendingLocal { record });
        }

        if incoming.version < record.version {
            return Ok(ServerUpsert::IgnoredStale {
                local_id: record.local_id,
            });
        }

        let parent_server = incoming.parent_server_id.map(|id| id.get());
        sqlx::query(
            r#"
            UPDATE entities
            SET server_id = ?3,
                version = ?4,
                payload = ?5,
                parent_server_id = COALESCE(?6, parent_server_id),
                parent_local_id = CASE WHEN ?6 IS NOT NULL THEN NULL ELSE parent_local_id END,
                server_updated_at = ?7,
                last_synced_at = ?8
            WHERE entity_kind = ?1 AND local_id = ?2
            "#,
        )
        .bind(kind.as_str())
        .bind(record.local_id.to_string())
        .bind(incoming.server_id.get())
        .bind(incoming.version)
        .bind(incoming.data.as_json().to_string())
        .bind(parent_server)
        .bind(datetime_to_timestamp(&incoming.updated_at))
        .bind(datetime_to_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(ServerUpsert::Applied {
            local_id: record.local_id,
        })
    }
}
