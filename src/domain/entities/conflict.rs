use crate::domain::entities::record::{ConflictSnapshot, EntityRecord};
use crate::domain::value_objects::{EntityKind, LocalId, SyncPayload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A divergence between local pending state and server state, surfaced for
/// explicit resolution. Both sides are retained; the engine never merges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConflict {
    pub kind: EntityKind,
    pub local_id: LocalId,
    pub local_payload: SyncPayload,
    pub server_payload: Option<SyncPayload>,
    pub server_version: Option<i64>,
    pub server_deleted: bool,
    pub detected_at: DateTime<Utc>,
}

impl SyncConflict {
    pub fn from_record(record: &EntityRecord) -> Option<Self> {
        let snapshot = record.conflict.as_ref()?;
        Some(Self::new(record, snapshot))
    }

    pub fn new(record: &EntityRecord, snapshot: &ConflictSnapshot) -> Self {
        Self {
            kind: record.kind,
            local_id: record.local_id,
            local_payload: record.payload.clone(),
            server_payload: snapshot.payload.clone(),
            server_version: snapshot.version,
            server_deleted: snapshot.deleted,
            detected_at: Utc::now(),
        }
    }
}

/// The user's verdict on a conflicted entity.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictChoice {
    /// Keep the local payload and retry the push at the server's version.
    KeepMine,
    /// Discard local changes and adopt the retained server snapshot.
    TakeTheirs,
    /// Keep a manually merged payload and retry at the server's version.
    Merge(SyncPayload),
}
