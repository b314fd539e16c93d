use crate::domain::value_objects::DeviceId;
use crate::shared::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Engine-owned persisted state: the stable device identity and the watermark
/// of the last fully successful sync pass.
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    /// The device id, generated and persisted on first access.
    async fn device_id(&self) -> Result<DeviceId>;

    async fn last_sync_at(&self) -> Result<Option<DateTime<Utc>>>;

    async fn set_last_sync_at(&self, at: DateTime<Utc>) -> Result<()>;
}
