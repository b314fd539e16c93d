use crate::domain::entities::ServerRecord;
use crate::domain::value_objects::{DeviceId, EntityKind, LocalId, OperationType, ServerId, SyncPayload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Failure of a whole push or pull request. All variants abort the sync pass
/// with the outbox untouched; only per-operation results affect retry counts.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: status {status}")]
    Http { status: u16 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushOperation {
    pub local_id: LocalId,
    pub operation_type: OperationType,
    pub entity_type: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<ServerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SyncPayload>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushRequest {
    pub device_id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub operations: Vec<PushOperation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Created,
    Updated,
    Deleted,
    Toggled,
    Conflict,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushOperationResult {
    pub local_id: LocalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<ServerId>,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushResponse {
    pub success: bool,
    pub results: Vec<PushOperationResult>,
    pub server_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullRequest {
    pub device_id: DeviceId,
    /// Watermark of the previous successful pull; `None` requests everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    pub entities: Vec<EntityKind>,
}

/// Server-side deltas keyed by entity kind wire name. Unknown kinds are
/// skipped by the engine so an older client survives a newer server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PullData {
    #[serde(default)]
    pub updated: HashMap<String, Vec<ServerRecord>>,
    #[serde(default)]
    pub deleted: HashMap<String, Vec<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullResponse {
    pub success: bool,
    pub data: PullData,
    pub server_time: DateTime<Utc>,
}

/// Executes a single push batch or pull request against the remote service.
/// Implemented by the REST client outside this crate; request timeouts are the
/// transport's responsibility and surface as `TransportError::Timeout`.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn push(&self, request: PushRequest) -> Result<PushResponse, TransportError>;
    async fn pull(&self, request: PullRequest) -> Result<PullResponse, TransportError>;
}
