use serde::{Deserialize, Serialize};
use std::fmt;

/// Synchronization state machine of a cached entity. Transitions happen only
/// through the local store mutation API and sync result application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    PendingCreate,
    PendingUpdate,
    PendingDelete,
    Conflicted,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::PendingCreate => "pending_create",
            SyncStatus::PendingUpdate => "pending_update",
            SyncStatus::PendingDelete => "pending_delete",
            SyncStatus::Conflicted => "conflicted",
        }
    }

    pub fn from_str(value: &str) -> Result<Self, String> {
        match value {
            "synced" => Ok(SyncStatus::Synced),
            "pending_create" => Ok(SyncStatus::PendingCreate),
            "pending_update" => Ok(SyncStatus::PendingUpdate),
            "pending_delete" => Ok(SyncStatus::PendingDelete),
            "conflicted" => Ok(SyncStatus::Conflicted),
            other => Err(format!("Unknown sync status: {other}")),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            SyncStatus::PendingCreate | SyncStatus::PendingUpdate | SyncStatus::PendingDelete
        )
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
