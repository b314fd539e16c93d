use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Process-generated identity assigned at creation, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalId(Uuid);

impl LocalId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    pub fn parse_str(value: &str) -> Result<Self, String> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| format!("Invalid local id: {value}"))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned identity, present once the entity was created remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerId(i64);

impl ServerId {
    pub fn new(value: i64) -> Result<Self, String> {
        if value <= 0 {
            return Err(format!("Server id must be positive, got {value}"));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an entity as seen by display and reference code: offline-created
/// entities are addressed by their local uuid until the server assigns an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityId {
    Local(LocalId),
    Remote(ServerId),
}

impl EntityId {
    pub fn local(&self) -> Option<&LocalId> {
        match self {
            EntityId::Local(id) => Some(id),
            EntityId::Remote(_) => None,
        }
    }

    pub fn remote(&self) -> Option<ServerId> {
        match self {
            EntityId::Local(_) => None,
            EntityId::Remote(id) => Some(*id),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Local(id) => write!(f, "local:{id}"),
            EntityId::Remote(id) => write!(f, "remote:{id}"),
        }
    }
}

impl From<LocalId> for EntityId {
    fn from(value: LocalId) -> Self {
        EntityId::Local(value)
    }
}

impl From<ServerId> for EntityId {
    fn from(value: ServerId) -> Self {
        EntityId::Remote(value)
    }
}
