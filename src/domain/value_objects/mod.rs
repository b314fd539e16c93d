pub mod device_id;
pub mod entity_id;
pub mod entity_kind;
pub mod operation_type;
pub mod payload;
pub mod sync_status;

pub use device_id::DeviceId;
pub use entity_id::{EntityId, LocalId, ServerId};
pub use entity_kind::EntityKind;
pub use operation_type::OperationType;
pub use payload::SyncPayload;
pub use sync_status::SyncStatus;
