use crate::domain::entities::{OperationDraft, PendingOperation};
use crate::domain::value_objects::LocalId;
use crate::shared::error::Result;
use async_trait::async_trait;

/// Durable, ordered queue of mutations awaiting server confirmation.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Insert an operation, replacing any pending operation for the same
    /// entity in the same transaction: only the latest intent is replayed.
    async fn enqueue(&self, draft: OperationDraft) -> Result<PendingOperation>;

    /// All pending operations ordered for safe replay: toggles first,
    /// creates/updates next, deletes last; creation order within a class.
    async fn next_batch(&self) -> Result<Vec<PendingOperation>>;

    async fn record_failure(&self, id: i64, error: &str) -> Result<()>;

    async fn remove(&self, id: i64) -> Result<()>;

    async fn remove_for_entity(&self, local_id: &LocalId) -> Result<u64>;

    async fn pending_count(&self) -> Result<u64>;

    async fn pending_count_for_entity(&self, local_id: &LocalId) -> Result<u64>;

    async fn has_pending(&self, local_id: &LocalId) -> Result<bool>;
}
