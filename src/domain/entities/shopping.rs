use crate::domain::entities::record::DomainEntity;
use crate::domain::value_objects::EntityKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShoppingList {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

impl DomainEntity for ShoppingList {
    const KIND: EntityKind = EntityKind::ShoppingList;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShoppingItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub checked: bool,
}

impl DomainEntity for ShoppingItem {
    const KIND: EntityKind = EntityKind::ShoppingItem;
}
