use crate::domain::entities::{ConflictSnapshot, EntityRecord, PendingOperation};
use crate::domain::value_objects::{
    EntityId, EntityKind, LocalId, OperationType, ServerId, SyncPayload, SyncStatus,
};
use crate::infrastructure::database::rows::{EntityRow, OutboxRow};
use crate::shared::error::{Result, SyncError};
use chrono::{DateTime, Utc};

pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

pub fn datetime_to_timestamp(at: &DateTime<Utc>) -> i64 {
    at.timestamp()
}

fn corrupt(context: &str, err: String) -> SyncError {
    SyncError::Storage(format!("Corrupt {context}: {err}"))
}

pub fn entity_record_from_row(row: EntityRow) -> Result<EntityRecord> {
    let local_id =
        LocalId::parse_str(&row.local_id).map_err(|e| corrupt("entity local_id", e))?;
    let kind = EntityKind::from_str(&row.entity_kind).map_err(|e| corrupt("entity kind", e))?;
    let sync_status =
        SyncStatus::from_str(&row.sync_status).map_err(|e| corrupt("sync status", e))?;
    let server_id = row
        .server_id
        .map(|id| ServerId::new(id).map_err(|e| corrupt("server id", e)))
        .transpose()?;

    let parent = match (row.parent_server_id, row.parent_local_id.as_deref()) {
        (Some(id), _) => Some(EntityId::Remote(
            ServerId::new(id).map_err(|e| corrupt("parent server id", e))?,
        )),
        (None, Some(raw)) => Some(EntityId::Local(
            LocalId::parse_str(raw).map_err(|e| corrupt("parent local id", e))?,
        )),
        (None, None) => None,
    };

    let payload =
        SyncPayload::from_json_str(&row.payload).map_err(|e| corrupt("entity payload", e))?;

    let conflict = if sync_status == SyncStatus::Conflicted {
        let conflict_payload = row
            .conflict_payload
            .as_deref()
            .map(SyncPayload::from_json_str)
            .transpose()
            .map_err(|e| corrupt("conflict payload", e))?;
        Some(ConflictSnapshot {
            payload: conflict_payload,
            version: row.conflict_version,
            updated_at: row.conflict_updated_at.map(timestamp_to_datetime),
            deleted: row.conflict_deleted,
        })
    } else {
        None
    };

    Ok(EntityRecord {
        local_id,
        kind,
        server_id,
        version: row.version,
        sync_status,
        parent,
        payload,
        local_updated_at: timestamp_to_datetime(row.local_updated_at),
        last_synced_at: row.last_synced_at.map(timestamp_to_datetime),
        server_updated_at: row.server_updated_at.map(timestamp_to_datetime),
        conflict,
        last_sync_error: row.sync_error,
    })
}

pub fn pending_operation_from_row(row: OutboxRow) -> Result<PendingOperation> {
    let operation_type =
        OperationType::from_str(&row.operation_type).map_err(|e| corrupt("operation type", e))?;
    let entity_kind =
        EntityKind::from_str(&row.entity_kind).map_err(|e| corrupt("operation kind", e))?;
    let local_entity_id = LocalId::parse_str(&row.local_entity_id)
        .map_err(|e| corrupt("operation local id", e))?;
    let server_entity_id = row
        .server_entity_id
        .map(|id| ServerId::new(id).map_err(|e| corrupt("operation server id", e)))
        .transpose()?;
    let parent_server_id = row
        .parent_server_id
        .map(|id| ServerId::new(id).map_err(|e| corrupt("operation parent id", e)))
        .transpose()?;
    let payload =
        SyncPayload::from_json_str(&row.payload).map_err(|e| corrupt("operation payload", e))?;

    let retry_count = u32::try_from(row.retry_count)
        .map_err(|_| corrupt("retry count", row.retry_count.to_string()))?;
    let max_retries = u32::try_from(row.max_retries)
        .map_err(|_| corrupt("max retries", row.max_retries.to_string()))?;

    Ok(PendingOperation {
        id: row.id,
        operation_type,
        entity_kind,
        local_entity_id,
        server_entity_id,
        parent_server_id,
        endpoint: row.endpoint,
        http_method: row.http_method,
        payload,
        priority: row.priority,
        retry_count,
        max_retries,
        last_error: row.last_error,
        last_attempt_at: row.last_attempt_at.map(timestamp_to_datetime),
        created_at: timestamp_to_datetime(row.created_at),
    })
}
