pub mod connection_pool;
pub mod mappers;
pub mod rows;
pub mod sqlite_local_store;
pub mod sqlite_outbox;
pub mod sqlite_sync_state;

pub use connection_pool::ConnectionPool;
pub use sqlite_local_store::SqliteLocalStore;
pub use sqlite_outbox::SqliteOutbox;
pub use sqlite_sync_state::SqliteSyncState;
