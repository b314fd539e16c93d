use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Create,
    Update,
    Delete,
    Toggle,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Create => "create",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
            OperationType::Toggle => "toggle",
        }
    }

    pub fn from_str(value: &str) -> Result<Self, String> {
        match value {
            "create" => Ok(OperationType::Create),
            "update" => Ok(OperationType::Update),
            "delete" => Ok(OperationType::Delete),
            "toggle" => Ok(OperationType::Toggle),
            other => Err(format!("Unknown operation type: {other}")),
        }
    }

    /// Replay ordering class: toggles first, creates/updates next, deletes
    /// last, so a parent is never deleted before its dependent creates land.
    pub fn priority(&self) -> i64 {
        match self {
            OperationType::Toggle => 0,
            OperationType::Create | OperationType::Update => 1,
            OperationType::Delete => 2,
        }
    }

    pub fn http_method(&self) -> &'static str {
        match self {
            OperationType::Create => "POST",
            OperationType::Update => "PUT",
            OperationType::Delete => "DELETE",
            OperationType::Toggle => "PATCH",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
