use crate::domain::value_objects::{EntityId, EntityKind, LocalId, ServerId, SyncPayload, SyncStatus};
use crate::shared::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Typed domain payload bound to its entity kind. Conversion to and from the
/// serialized sync payload happens only here.
pub trait DomainEntity: Serialize + DeserializeOwned + Send + Sync {
    const KIND: EntityKind;

    fn to_payload(&self) -> Result<SyncPayload> {
        let value = serde_json::to_value(self)?;
        SyncPayload::new(value).map_err(SyncError::Validation)
    }

    fn from_payload(payload: &SyncPayload) -> Result<Self> {
        serde_json::from_value(payload.as_json().clone()).map_err(SyncError::from)
    }
}

/// Server snapshot retained alongside a conflicted record until the user
/// resolves it. The payload may be absent when the conflict was reported by a
/// push result, which carries no body; the next pull fills it in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictSnapshot {
    pub payload: Option<SyncPayload>,
    pub version: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted: bool,
}

impl ConflictSnapshot {
    pub fn deleted_on_server() -> Self {
        Self {
            payload: None,
            version: None,
            updated_at: None,
            deleted: true,
        }
    }

    pub fn from_server_record(record: &ServerRecord) -> Self {
        Self {
            payload: Some(record.data.clone()),
            version: Some(record.version),
            updated_at: Some(record.updated_at),
            deleted: false,
        }
    }

    pub fn version_only(version: Option<i64>, updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            payload: None,
            version,
            updated_at,
            deleted: false,
        }
    }
}

/// Cached entity with its sync bookkeeping. One row per entity in the local
/// store regardless of kind; the domain payload stays serialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityRecord {
    pub local_id: LocalId,
    pub kind: EntityKind,
    pub server_id: Option<ServerId>,
    pub version: i64,
    pub sync_status: SyncStatus,
    pub parent: Option<EntityId>,
    pub payload: SyncPayload,
    pub local_updated_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub server_updated_at: Option<DateTime<Utc>>,
    pub conflict: Option<ConflictSnapshot>,
    /// Terminal push error after the retry budget was exhausted. Cleared by
    /// the next local edit, which makes the entity eligible for sync again.
    pub last_sync_error: Option<String>,
}

impl EntityRecord {
    pub fn new_local(kind: EntityKind, payload: SyncPayload, parent: Option<EntityId>) -> Self {
        Self {
            local_id: LocalId::generate(),
            kind,
            server_id: None,
            version: 1,
            sync_status: SyncStatus::PendingCreate,
            parent,
            payload,
            local_updated_at: Utc::now(),
            last_synced_at: None,
            server_updated_at: None,
            conflict: None,
            last_sync_error: None,
        }
    }

    /// Identity for display and reference code: the server id once known,
    /// otherwise the local uuid.
    pub fn id(&self) -> EntityId {
        match self.server_id {
            Some(server_id) => EntityId::Remote(server_id),
            None => EntityId::Local(self.local_id),
        }
    }

    pub fn decode<E: DomainEntity>(&self) -> Result<E> {
        if self.kind != E::KIND {
            return Err(SyncError::Validation(format!(
                "Record {} is a {}, not a {}",
                self.local_id,
                self.kind,
                E::KIND
            )));
        }
        E::from_payload(&self.payload)
    }
}

/// An entity as reported by the server in a pull delta or seeded from a push
/// result. `local_id` is echoed back when the server learned it from a push,
/// which lets offline-created entities reconcile even after a lost ack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerRecord {
    pub server_id: ServerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<LocalId>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_server_id: Option<ServerId>,
    pub data: SyncPayload,
}
