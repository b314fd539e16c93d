pub mod asset;
pub mod conflict;
pub mod goal;
pub mod pending_operation;
pub mod record;
pub mod shopping;

pub use asset::Asset;
pub use conflict::{ConflictChoice, SyncConflict};
pub use goal::{Goal, GoalTask};
pub use pending_operation::{OperationDraft, PendingOperation};
pub use record::{ConflictSnapshot, DomainEntity, EntityRecord, ServerRecord};
pub use shopping::{ShoppingItem, ShoppingList};
