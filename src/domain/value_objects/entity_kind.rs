use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    ShoppingList,
    ShoppingItem,
    Goal,
    GoalTask,
    Asset,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::ShoppingList,
        EntityKind::ShoppingItem,
        EntityKind::Goal,
        EntityKind::GoalTask,
        EntityKind::Asset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::ShoppingList => "shopping_list",
            EntityKind::ShoppingItem => "shopping_item",
            EntityKind::Goal => "goal",
            EntityKind::GoalTask => "goal_task",
            EntityKind::Asset => "asset",
        }
    }

    pub fn from_str(value: &str) -> Result<Self, String> {
        match value {
            "shopping_list" => Ok(EntityKind::ShoppingList),
            "shopping_item" => Ok(EntityKind::ShoppingItem),
            "goal" => Ok(EntityKind::Goal),
            "goal_task" => Ok(EntityKind::GoalTask),
            "asset" => Ok(EntityKind::Asset),
            other => Err(format!("Unknown entity kind: {other}")),
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            EntityKind::ShoppingList => "/api/shopping-lists",
            EntityKind::ShoppingItem => "/api/shopping-items",
            EntityKind::Goal => "/api/goals",
            EntityKind::GoalTask => "/api/goal-tasks",
            EntityKind::Asset => "/api/assets",
        }
    }

    /// Kind of the owned sub-entities, if this kind is a parent.
    pub fn child_kind(&self) -> Option<EntityKind> {
        match self {
            EntityKind::ShoppingList => Some(EntityKind::ShoppingItem),
            EntityKind::Goal => Some(EntityKind::GoalTask),
            _ => None,
        }
    }

    pub fn parent_kind(&self) -> Option<EntityKind> {
        match self {
            EntityKind::ShoppingItem => Some(EntityKind::ShoppingList),
            EntityKind::GoalTask => Some(EntityKind::Goal),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
