use crate::domain::entities::record::EntityRecord;
use crate::domain::value_objects::{EntityKind, LocalId, OperationType, ServerId, SyncPayload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A mutation intent awaiting server confirmation, as persisted in the outbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingOperation {
    pub id: i64,
    pub operation_type: OperationType,
    pub entity_kind: EntityKind,
    pub local_entity_id: LocalId,
    pub server_entity_id: Option<ServerId>,
    pub parent_server_id: Option<ServerId>,
    pub endpoint: String,
    pub http_method: String,
    pub payload: SyncPayload,
    pub priority: i64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PendingOperation {
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Not-yet-persisted outbox operation. Built by the mutation service when a
/// local change is staged, and by the engine's requeue sweep when it finds a
/// pending record with no queued operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDraft {
    pub operation_type: OperationType,
    pub entity_kind: EntityKind,
    pub local_entity_id: LocalId,
    pub server_entity_id: Option<ServerId>,
    pub parent_server_id: Option<ServerId>,
    pub endpoint: String,
    pub http_method: String,
    pub payload: SyncPayload,
    pub max_retries: u32,
}

impl OperationDraft {
    pub fn for_record(
        record: &EntityRecord,
        operation_type: OperationType,
        max_retries: u32,
    ) -> Self {
        let endpoint = match operation_type {
            OperationType::Create => record.kind.endpoint().to_string(),
            _ => match record.server_id {
                Some(server_id) => format!("{}/{}", record.kind.endpoint(), server_id),
                None => format!("{}/{}", record.kind.endpoint(), record.local_id),
            },
        };

        Self {
            operation_type,
            entity_kind: record.kind,
            local_entity_id: record.local_id,
            server_entity_id: record.server_id,
            parent_server_id: record.parent.as_ref().and_then(|p| p.remote()),
            endpoint,
            http_method: operation_type.http_method().to_string(),
            payload: record.payload.clone(),
            max_retries,
        }
    }

    pub fn priority(&self) -> i64 {
        self.operation_type.priority()
    }
}
