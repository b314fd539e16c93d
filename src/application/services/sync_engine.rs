use crate::application::ports::connectivity::ConnectivityGate;
use crate::application::ports::local_store::{LocalStore, ServerUpsert};
use crate::application::ports::outbox::Outbox;
use crate::application::ports::sync_state::SyncStateStore;
use crate::application::ports::transport::{
    OperationStatus, PushOperation, PushOperationResult, PushRequest, PullRequest, SyncTransport,
};
use crate::application::services::conflict_resolver::ConflictResolver;
use crate::domain::entities::{ConflictSnapshot, OperationDraft, PendingOperation, SyncConflict};
use crate::domain::value_objects::{EntityId, EntityKind, LocalId, OperationType, ServerId, SyncStatus};
use crate::shared::config::SyncConfig;
use crate::shared::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncReport {
    pub requeued: usize,
    pub pushed: usize,
    pub conflicts: usize,
    pub abandoned: usize,
    pub unacknowledged: usize,
    pub pulled_updates: usize,
    pub pulled_deletes: usize,
    pub completed_at: DateTime<Utc>,
}

/// Engine state transitions published to the host shell. Replaces the
/// source's notification-center broadcast with a typed channel.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Started,
    Completed(SyncReport),
    Failed {
        message: String,
    },
    ConflictDetected(SyncConflict),
    OperationAbandoned {
        kind: EntityKind,
        local_id: LocalId,
        message: String,
    },
}

/// Result of a single sync trigger.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// No connectivity; nothing was touched.
    Offline,
    /// Another pass holds the gate; the trigger is coalesced, not queued.
    AlreadySyncing,
    /// The pass aborted; queued operations and the watermark are untouched.
    Failed { message: String },
}

/// The only sync information the UI layer is ever shown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncStatusSnapshot {
    pub syncing: bool,
    pub pending_operations: u64,
    pub conflict_count: u64,
    pub last_error: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct PushStats {
    confirmed: usize,
    conflicts: usize,
    abandoned: usize,
    unacknowledged: usize,
}

#[derive(Debug, Default)]
struct PullStats {
    updated: usize,
    deleted: usize,
}

/// Orchestrates one full synchronization pass: requeue sweep, push the
/// outbox, apply per-operation results, pull server deltas, advance the
/// watermark. Strictly single-flight.
pub struct SyncEngine {
    store: Arc<dyn LocalStore>,
    outbox: Arc<dyn Outbox>,
    transport: Arc<dyn SyncTransport>,
    connectivity: Arc<dyn ConnectivityGate>,
    sync_state: Arc<dyn SyncStateStore>,
    resolver: ConflictResolver,
    config: SyncConfig,
    gate: Mutex<()>,
    syncing: AtomicBool,
    last_error: RwLock<Option<String>>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn LocalStore>,
        outbox: Arc<dyn Outbox>,
        transport: Arc<dyn SyncTransport>,
        connectivity: Arc<dyn ConnectivityGate>,
        sync_state: Arc<dyn SyncStateStore>,
        config: SyncConfig,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        let resolver = ConflictResolver::new(store.clone(), outbox.clone(), config.clone());
        Arc::new(Self {
            store,
            outbox,
            transport,
            connectivity,
            sync_state,
            resolver,
            config,
            gate: Mutex::new(()),
            syncing: AtomicBool::new(false),
            last_error: RwLock::new(None),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    /// Fire-and-forget sync pass; concurrent triggers coalesce.
    pub fn trigger(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.sync_once().await;
        });
    }

    /// Trigger a pass on every offline-to-online transition that finds
    /// pending work.
    pub fn spawn_connectivity_watcher(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut rx = engine.connectivity.subscribe();
        tokio::spawn(async move {
            let mut was_online = *rx.borrow();
            while rx.changed().await.is_ok() {
                let online = *rx.borrow();
                if online && !was_online {
                    match engine.outbox.pending_count().await {
                        Ok(count) if count > 0 => {
                            tracing::info!(
                                target: "sync::engine",
                                pending = count,
                                "connectivity regained, triggering sync"
                            );
                            engine.trigger();
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!(
                                target: "sync::engine",
                                error = %err,
                                "failed to inspect outbox on connectivity change"
                            );
                        }
                    }
                }
                was_online = online;
            }
        })
    }

    pub async fn status(&self) -> Result<SyncStatusSnapshot> {
        Ok(SyncStatusSnapshot {
            syncing: self.syncing.load(Ordering::SeqCst),
            pending_operations: self.outbox.pending_count().await?,
            conflict_count: self.store.list_conflicted().await?.len() as u64,
            last_error: self.last_error.read().await.clone(),
            last_sync_at: self.sync_state.last_sync_at().await?,
        })
    }

    /// Run one pass now. Returns immediately with `AlreadySyncing` when a
    /// pass holds the gate and with `Offline` when there is no connectivity.
    pub async fn sync_once(&self) -> SyncOutcome {
        let Ok(_guard) = self.gate.try_lock() else {
            tracing::debug!(target: "sync::engine", "sync already in progress, coalescing trigger");
            return SyncOutcome::AlreadySyncing;
        };

        if !self.connectivity.is_online() {
            tracing::debug!(target: "sync::engine", "offline, skipping sync pass");
            return SyncOutcome::Offline;
        }

        self.syncing.store(true, Ordering::SeqCst);
        self.emit(SyncEvent::Started);

        let outcome = match self.run_pass().await {
            Ok(report) => {
                *self.last_error.write().await = None;
                tracing::info!(
                    target: "sync::engine",
                    pushed = report.pushed,
                    conflicts = report.conflicts,
                    pulled = report.pulled_updates,
                    "sync pass completed"
                );
                self.emit(SyncEvent::Completed(report.clone()));
                SyncOutcome::Completed(report)
            }
            Err(err) => {
                let message = err.to_string();
                *self.last_error.write().await = Some(message.clone());
                tracing::warn!(target: "sync::engine", error = %message, "sync pass aborted");
                self.emit(SyncEvent::Failed {
                    message: message.clone(),
                });
                SyncOutcome::Failed { message }
            }
        };

        self.syncing.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_pass(&self) -> Result<SyncReport> {
        let requeued = self.requeue_sweep().await?;
        let push = self.push_phase().await?;
        let pull = self.pull_phase().await?;

        Ok(SyncReport {
            requeued,
            pushed: push.confirmed,
            conflicts: push.conflicts,
            abandoned: push.abandoned,
            unacknowledged: push.unacknowledged,
            pulled_updates: pull.updated,
            pulled_deletes: pull.deleted,
            completed_at: Utc::now(),
        })
    }

    /// Rebuild outbox operations for pending records that lost theirs, e.g.
    /// when a staging call crashed between the store write and the enqueue.
    async fn requeue_sweep(&self) -> Result<usize> {
        let pending = self.store.list_pending().await?;
        let mut requeued = 0;

        for record in pending {
            // Abandoned operations stay terminal until a fresh local edit
            // clears the recorded error.
            if record.last_sync_error.is_some() {
                continue;
            }
            if self.outbox.has_pending(&record.local_id).await? {
                continue;
            }
            let operation = match record.sync_status {
                SyncStatus::PendingCreate => OperationType::Create,
                SyncStatus::PendingUpdate => OperationType::Update,
                SyncStatus::PendingDelete => OperationType::Delete,
                _ => continue,
            };
            self.outbox
                .enqueue(OperationDraft::for_record(
                    &record,
                    operation,
                    self.config.max_retries,
                ))
                .await?;
            requeued += 1;
            tracing::debug!(
                target: "sync::engine",
                entity = %record.local_id,
                kind = %record.kind,
                "requeued orphaned pending record"
            );
        }

        Ok(requeued)
    }

    async fn push_phase(&self) -> Result<PushStats> {
        let batch = self.outbox.next_batch().await?;
        if batch.is_empty() {
            return Ok(PushStats::default());
        }

        let device_id = self.sync_state.device_id().await?;
        let mut operations = Vec::with_capacity(batch.len());
        for operation in &batch {
            operations.push(self.wire_operation(operation).await?);
        }

        tracing::debug!(
            target: "sync::engine",
            operations = operations.len(),
            "pushing batch"
        );

        let response = self
            .transport
            .push(PushRequest {
                device_id,
                device_name: self.config.device_name.clone(),
                operations,
            })
            .await?;

        let mut by_local_id: HashMap<LocalId, PendingOperation> = batch
            .into_iter()
            .map(|op| (op.local_entity_id, op))
            .collect();

        let mut stats = PushStats::default();
        for result in &response.results {
            let Some(operation) = by_local_id.remove(&result.local_id) else {
                tracing::warn!(
                    target: "sync::engine",
                    local_id = %result.local_id,
                    "push result does not match any submitted operation"
                );
                continue;
            };
            self.apply_push_result(&operation, result, &mut stats).await?;
        }

        // Submitted operations the server did not acknowledge stay queued
        // untouched for the next pass.
        stats.unacknowledged = by_local_id.len();
        if stats.unacknowledged > 0 {
            tracing::warn!(
                target: "sync::engine",
                count = stats.unacknowledged,
                "push response left operations unacknowledged"
            );
        }

        Ok(stats)
    }

    /// Serialize an outbox operation, resolving the parent reference at send
    /// time: the parent may have gained a server id since the enqueue.
    async fn wire_operation(&self, operation: &PendingOperation) -> Result<PushOperation> {
        let record = self
            .store
            .get(operation.entity_kind, &operation.local_entity_id)
            .await?;

        let (server_id, version) = match &record {
            Some(r) => (r.server_id.or(operation.server_entity_id), Some(r.version)),
            None => (operation.server_entity_id, None),
        };

        let mut data = operation.payload.clone();
        if let Some(record) = &record {
            match &record.parent {
                Some(EntityId::Remote(parent_id)) => {
                    let _ = data.set_field("parent_server_id", json!(parent_id.get()));
                }
                Some(EntityId::Local(parent_local_id)) => {
                    let resolved = match operation.entity_kind.parent_kind() {
                        Some(parent_kind) => self
                            .store
                            .get(parent_kind, parent_local_id)
                            .await?
                            .and_then(|parent| parent.server_id),
                        None => None,
                    };
                    match resolved {
                        Some(parent_id) => {
                            let _ = data.set_field("parent_server_id", json!(parent_id.get()));
                        }
                        None => {
                            // Parent is still in the same batch; the server
                            // correlates through its local id.
                            let _ = data.set_field(
                                "parent_local_id",
                                json!(parent_local_id.to_string()),
                            );
                        }
                    }
                }
                None => {}
            }
        }

        Ok(PushOperation {
            local_id: operation.local_entity_id,
            operation_type: operation.operation_type,
            entity_type: operation.entity_kind,
            server_id,
            version,
            data: Some(data),
            created_at: operation.created_at,
        })
    }

    async fn apply_push_result(
        &self,
        operation: &PendingOperation,
        result: &PushOperationResult,
        stats: &mut PushStats,
    ) -> Result<()> {
        match result.status {
            OperationStatus::Created | OperationStatus::Updated | OperationStatus::Toggled => {
                let Some(server_id) = result.server_id.or(operation.server_entity_id) else {
                    tracing::warn!(
                        target: "sync::engine",
                        local_id = %operation.local_entity_id,
                        "confirmation without a server id; operation stays queued"
                    );
                    return Ok(());
                };

                self.store
                    .mark_synced(
                        operation.entity_kind,
                        &operation.local_entity_id,
                        server_id,
                        result.version,
                        result.server_updated_at,
                    )
                    .await?;

                // Children created offline referenced the parent by local id;
                // attach the real server id now that it exists.
                if let Some(child_kind) = operation.entity_kind.child_kind() {
                    let touched = self
                        .store
                        .reparent(child_kind, &operation.local_entity_id, server_id)
                        .await?;
                    if touched > 0 {
                        tracing::debug!(
                            target: "sync::engine",
                            parent = %operation.local_entity_id,
                            children = touched,
                            "attached server id to children"
                        );
                    }
                }

                self.outbox.remove(operation.id).await?;
                stats.confirmed += 1;
            }
            OperationStatus::Deleted => {
                self.store
                    .remove(operation.entity_kind, &operation.local_entity_id)
                    .await?;
                self.outbox.remove(operation.id).await?;
                stats.confirmed += 1;
            }
            OperationStatus::Conflict => {
                let conflict = self.resolver.on_push_conflict(operation, result).await?;
                // The resolver never discards local state on detection, so
                // the operation stays queued until the user resolves.
                self.emit(SyncEvent::ConflictDetected(conflict));
                stats.conflicts += 1;
            }
            OperationStatus::Error => {
                let message = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "Operation rejected by server".to_string());
                if operation.can_retry() {
                    self.outbox.record_failure(operation.id, &message).await?;
                    tracing::debug!(
                        target: "sync::engine",
                        local_id = %operation.local_entity_id,
                        retry = operation.retry_count + 1,
                        "operation failed, will retry"
                    );
                } else {
                    self.outbox.remove(operation.id).await?;
                    self.store
                        .record_sync_error(
                            operation.entity_kind,
                            &operation.local_entity_id,
                            &message,
                        )
                        .await?;
                    *self.last_error.write().await = Some(message.clone());
                    tracing::warn!(
                        target: "sync::engine",
                        local_id = %operation.local_entity_id,
                        error = %message,
                        "operation abandoned after exhausting retries"
                    );
                    self.emit(SyncEvent::OperationAbandoned {
                        kind: operation.entity_kind,
                        local_id: operation.local_entity_id,
                        message,
                    });
                    stats.abandoned += 1;
                }
            }
        }
        Ok(())
    }

    async fn pull_phase(&self) -> Result<PullStats> {
        let device_id = self.sync_state.device_id().await?;
        let since = self.sync_state.last_sync_at().await?;
        let response = self
            .transport
            .pull(PullRequest {
                device_id,
                since,
                entities: EntityKind::ALL.to_vec(),
            })
            .await?;

        let mut stats = PullStats::default();

        // Deletions first: an entity recreated server-side must not collide
        // with its own tombstone.
        for (kind_name, ids) in &response.data.deleted {
            let Ok(kind) = EntityKind::from_str(kind_name) else {
                tracing::warn!(target: "sync::engine", kind = %kind_name, "skipping unknown entity kind in pull");
                continue;
            };
            for raw_id in ids {
                let Ok(server_id) = ServerId::new(*raw_id) else {
                    tracing::warn!(target: "sync::engine", id = *raw_id, "skipping invalid server id in pull");
                    continue;
                };
                let Some(record) = self.store.find_by_server_id(kind, server_id).await? else {
                    continue;
                };
                match record.sync_status {
                    SyncStatus::Synced => {
                        self.store.remove(kind, &record.local_id).await?;
                        stats.deleted += 1;
                    }
                    SyncStatus::Conflicted => {
                        self.store
                            .mark_conflicted(
                                kind,
                                &record.local_id,
                                ConflictSnapshot::deleted_on_server(),
                            )
                            .await?;
                    }
                    _ => {
                        // A pending local edit on a server-deleted entity is a
                        // conflict, not a silent delete.
                        let conflict = self.resolver.on_pull_delete_conflict(&record).await?;
                        self.emit(SyncEvent::ConflictDetected(conflict));
                    }
                }
            }
        }

        for (kind_name, records) in &response.data.updated {
            let Ok(kind) = EntityKind::from_str(kind_name) else {
                tracing::warn!(target: "sync::engine", kind = %kind_name, "skipping unknown entity kind in pull");
                continue;
            };
            for incoming in records {
                match self.store.upsert_from_server(kind, incoming).await? {
                    ServerUpsert::Inserted { .. } | ServerUpsert::Applied { .. } => {
                        stats.updated += 1;
                    }
                    ServerUpsert::IgnoredStale { .. } => {}
                    ServerUpsert::PendingLocal { record } => {
                        if record.sync_status == SyncStatus::Conflicted {
                            // Refresh the retained snapshot; the conflict is
                            // already surfaced.
                            self.store
                                .mark_conflicted(
                                    kind,
                                    &record.local_id,
                                    ConflictSnapshot::from_server_record(incoming),
                                )
                                .await?;
                        } else if incoming.version > record.version {
                            let conflict = self
                                .resolver
                                .on_pull_update_conflict(&record, incoming)
                                .await?;
                            self.emit(SyncEvent::ConflictDetected(conflict));
                        } else {
                            tracing::debug!(
                                target: "sync::engine",
                                entity = %record.local_id,
                                "pull echo at known version, keeping pending local edit"
                            );
                        }
                    }
                }
            }
        }

        // Server-clock watermark: a skewed device clock cannot skip deltas.
        self.sync_state.set_last_sync_at(response.server_time).await?;

        Ok(stats)
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::transport::{
        PullResponse, PushResponse, TransportError,
    };
    use crate::infrastructure::connectivity::WatchConnectivityGate;
    use crate::infrastructure::database::{
        ConnectionPool, SqliteLocalStore, SqliteOutbox, SqliteSyncState,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    /// Transport that answers everything successfully after an optional delay.
    struct SlowTransport {
        delay: Duration,
    }

    #[async_trait]
    impl SyncTransport for SlowTransport {
        async fn push(&self, request: PushRequest) -> std::result::Result<PushResponse, TransportError> {
            tokio::time::sleep(self.delay).await;
            Ok(PushResponse {
                success: true,
                results: request
                    .operations
                    .iter()
                    .enumerate()
                    .map(|(i, op)| PushOperationResult {
                        local_id: op.local_id,
                        server_id: Some(ServerId::new(1000 + i as i64).unwrap()),
                        status: OperationStatus::Created,
                        version: Some(1),
                        server_updated_at: Some(Utc::now()),
                        error: None,
                    })
                    .collect(),
                server_time: Utc::now(),
            })
        }

        async fn pull(&self, _request: PullRequest) -> std::result::Result<PullResponse, TransportError> {
            tokio::time::sleep(self.delay).await;
            Ok(PullResponse {
                success: true,
                data: Default::default(),
                server_time: Utc::now(),
            })
        }
    }

    async fn setup_engine(online: bool, delay: Duration) -> Arc<SyncEngine> {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        let store: Arc<dyn LocalStore> = Arc::new(SqliteLocalStore::new(pool.get_pool().clone()));
        let outbox: Arc<dyn Outbox> = Arc::new(SqliteOutbox::new(pool.get_pool().clone()));
        let sync_state: Arc<dyn SyncStateStore> =
            Arc::new(SqliteSyncState::new(pool.get_pool().clone()));
        let connectivity: Arc<dyn ConnectivityGate> = Arc::new(WatchConnectivityGate::new(online));
        let transport: Arc<dyn SyncTransport> = Arc::new(SlowTransport { delay });

        SyncEngine::new(
            store,
            outbox,
            transport,
            connectivity,
            sync_state,
            SyncConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_offline_pass_is_skipped_entirely() {
        let engine = setup_engine(false, Duration::ZERO).await;

        let outcome = engine.sync_once().await;

        assert!(matches!(outcome, SyncOutcome::Offline));
        let status = engine.status().await.unwrap();
        assert!(status.last_sync_at.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_trigger_returns_already_syncing() {
        let engine = setup_engine(true, Duration::from_millis(200)).await;

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.sync_once().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = engine.sync_once().await;

        assert!(matches!(second, SyncOutcome::AlreadySyncing));
        assert!(matches!(
            first.await.unwrap(),
            SyncOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_pass_advances_watermark() {
        let engine = setup_engine(true, Duration::ZERO).await;

        let outcome = engine.sync_once().await;

        assert!(matches!(outcome, SyncOutcome::Completed(_)));
        let status = engine.status().await.unwrap();
        assert!(status.last_sync_at.is_some());
        assert!(!status.syncing);
    }
}
