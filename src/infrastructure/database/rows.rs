use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct EntityRow {
    pub local_id: String,
    pub entity_kind: String,
    pub server_id: Option<i64>,
    pub version: i64,
    pub sync_status: String,
    pub parent_local_id: Option<String>,
    pub parent_server_id: Option<i64>,
    pub payload: String,
    pub local_updated_at: i64,
    pub last_synced_at: Option<i64>,
    pub server_updated_at: Option<i64>,
    pub conflict_payload: Option<String>,
    pub conflict_version: Option<i64>,
    pub conflict_updated_at: Option<i64>,
    pub conflict_deleted: bool,
    pub sync_error: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OutboxRow {
    pub id: i64,
    pub operation_type: String,
    pub entity_kind: String,
    pub local_entity_id: String,
    pub server_entity_id: Option<i64>,
    pub parent_server_id: Option<i64>,
    pub endpoint: String,
    pub http_method: String,
    pub payload: String,
    pub priority: i64,
    pub retry_count: i64,
    pub max_retries: i64,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct SyncStateRow {
    pub device_id: String,
    pub device_name: Option<String>,
    pub last_sync_at: Option<i64>,
}
