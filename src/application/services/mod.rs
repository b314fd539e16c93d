pub mod conflict_resolver;
pub mod mutation_service;
pub mod sync_engine;

pub use conflict_resolver::ConflictResolver;
pub use mutation_service::MutationService;
pub use sync_engine::{SyncEngine, SyncEvent, SyncOutcome, SyncReport, SyncStatusSnapshot};
