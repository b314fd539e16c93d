use crate::domain::entities::record::DomainEntity;
use crate::domain::value_objects::EntityKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
}

impl DomainEntity for Goal {
    const KIND: EntityKind = EntityKind::Goal;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalTask {
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

impl DomainEntity for GoalTask {
    const KIND: EntityKind = EntityKind::GoalTask;
}
