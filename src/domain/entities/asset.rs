use crate::domain::entities::record::DomainEntity;
use crate::domain::value_objects::EntityKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub name: String,
    pub category: String,
    pub value_cents: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquired_at: Option<NaiveDate>,
}

impl DomainEntity for Asset {
    const KIND: EntityKind = EntityKind::Asset;
}
