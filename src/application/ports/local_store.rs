use crate::domain::entities::{ConflictSnapshot, EntityRecord, ServerRecord};
use crate::domain::value_objects::{EntityKind, LocalId, ServerId, SyncPayload};
use crate::shared::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Outcome of applying a pulled server record to the local cache.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerUpsert {
    /// No local record existed; inserted as synced.
    Inserted { local_id: LocalId },
    /// Local record was synced and has been overwritten.
    Applied { local_id: LocalId },
    /// Incoming version is older than the cached one; nothing written.
    IgnoredStale { local_id: LocalId },
    /// Local record holds unsynced state; nothing written. The caller decides
    /// between skipping and surfacing a conflict.
    PendingLocal { record: EntityRecord },
}

/// Single source of truth for cached entities. All UI reads and all mutation
/// staging go through this port; sync status transitions happen only here.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn insert_local(&self, record: &EntityRecord) -> Result<()>;

    async fn get(&self, kind: EntityKind, local_id: &LocalId) -> Result<Option<EntityRecord>>;

    async fn find_by_server_id(
        &self,
        kind: EntityKind,
        server_id: ServerId,
    ) -> Result<Option<EntityRecord>>;

    /// Entities visible to the UI: everything except pending deletes.
    async fn list_active(&self, kind: EntityKind) -> Result<Vec<EntityRecord>>;

    /// Records in any pending status, across all kinds.
    async fn list_pending(&self) -> Result<Vec<EntityRecord>>;

    /// Children owned by the given parent, matched through either side of the
    /// parent reference.
    async fn list_children(
        &self,
        child_kind: EntityKind,
        parent_local_id: &LocalId,
        parent_server_id: Option<ServerId>,
    ) -> Result<Vec<EntityRecord>>;

    async fn list_conflicted(&self) -> Result<Vec<EntityRecord>>;

    /// Replace the payload and mark the record pending. Idempotent: staging
    /// the same payload twice yields the same state.
    async fn stage_local_change(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
        payload: SyncPayload,
    ) -> Result<EntityRecord>;

    /// Mark the record pending delete. It stays in the store, hidden from
    /// active queries, until the server confirms the deletion.
    async fn stage_local_delete(&self, kind: EntityKind, local_id: &LocalId)
        -> Result<EntityRecord>;

    /// Confirm a push or pull result: attach the server identity, adopt the
    /// server version and mark the record synced.
    async fn mark_synced(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
        server_id: ServerId,
        version: Option<i64>,
        server_updated_at: Option<DateTime<Utc>>,
    ) -> Result<EntityRecord>;

    async fn mark_conflicted(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
        snapshot: ConflictSnapshot,
    ) -> Result<EntityRecord>;

    /// Stamp a terminal push error on the record. The engine's requeue sweep
    /// ignores errored records; the next local edit clears the error.
    async fn record_sync_error(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
        message: &str,
    ) -> Result<EntityRecord>;

    /// Resolution: keep the local payload, adopt the server's version (or
    /// return to pending-create when the server deleted the entity) and clear
    /// the conflict.
    async fn resolve_keep_local(
        &self,
        kind: EntityKind,
        local_id: &LocalId,
        server_version: Option<i64>,
        server_deleted: bool,
    ) -> Result<EntityRecord>;

    /// Resolution: overwrite the payload with the retained server snapshot and
    /// mark the record synced.
    async fn resolve_take_server(&self, kind: EntityKind, local_id: &LocalId)
        -> Result<EntityRecord>;

    async fn remove(&self, kind: EntityKind, local_id: &LocalId) -> Result<()>;

    /// Rewrite children of `parent_local_id` to reference the parent's new
    /// server identity. Returns the number of records touched.
    async fn reparent(
        &self,
        child_kind: EntityKind,
        parent_local_id: &LocalId,
        parent_server_id: ServerId,
    ) -> Result<u64>;

    /// Apply a pulled server record under the non-clobber rule: pending local
    /// state is never overwritten.
    async fn upsert_from_server(
        &self,
        kind: EntityKind,
        incoming: &ServerRecord,
    ) -> Result<ServerUpsert>;
}
