use crate::application::ports::sync_state::SyncStateStore;
use crate::domain::value_objects::DeviceId;
use crate::infrastructure::database::mappers::{datetime_to_timestamp, timestamp_to_datetime};
use crate::infrastructure::database::rows::SyncStateRow;
use crate::shared::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub struct SqliteSyncState {
    pool: SqlitePool,
}

impl SqliteSyncState {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn ensure_row(&self) -> Result<SyncStateRow> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO sync_state (id, device_id, device_name, last_sync_at)
            VALUES (1, ?1, NULL, NULL)
            "#,
        )
        .bind(DeviceId::generate().to_string())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, SyncStateRow>(
            "SELECT device_id, device_name, last_sync_at FROM sync_state WHERE id = 1",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl SyncStateStore for SqliteSyncState {
    async fn device_id(&self) -> Result<DeviceId> {
        let row = self.ensure_row().await?;
        DeviceId::new(row.device_id)
            .map_err(|e| SyncError::Storage(format!("Corrupt device id: {e}")))
    }

    async fn last_sync_at(&self) -> Result<Option<DateTime<Utc>>> {
        let row = self.ensure_row().await?;
        Ok(row.last_sync_at.map(timestamp_to_datetime))
    }

    async fn set_last_sync_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.ensure_row().await?;
        sqlx::query("UPDATE sync_state SET last_sync_at = ?1 WHERE id = 1")
            .bind(datetime_to_timestamp(&at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
