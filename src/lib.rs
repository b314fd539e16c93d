pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::ports::connectivity::ConnectivityGate;
pub use application::ports::local_store::{LocalStore, ServerUpsert};
pub use application::ports::outbox::Outbox;
pub use application::ports::sync_state::SyncStateStore;
pub use application::ports::transport::{
    OperationStatus, PullData, PullRequest, PullResponse, PushOperation, PushOperationResult,
    PushRequest, PushResponse, SyncTransport, TransportError,
};
pub use application::services::{
    ConflictResolver, MutationService, SyncEngine, SyncEvent, SyncOutcome, SyncReport,
    SyncStatusSnapshot,
};
pub use domain::entities::{
    Asset, ConflictChoice, ConflictSnapshot, DomainEntity, EntityRecord, Goal, GoalTask,
    OperationDraft, PendingOperation, ServerRecord, ShoppingItem, ShoppingList, SyncConflict,
};
pub use domain::value_objects::{
    DeviceId, EntityId, EntityKind, LocalId, OperationType, ServerId, SyncPayload, SyncStatus,
};
pub use infrastructure::connectivity::WatchConnectivityGate;
pub use infrastructure::database::{
    ConnectionPool, SqliteLocalStore, SqliteOutbox, SqliteSyncState,
};
pub use shared::config::SyncConfig;
pub use shared::error::{Result, SyncError};
pub use shared::logging::init_logging;
