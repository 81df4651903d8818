//! Floor plan model

use serde::{Deserialize, Serialize};

/// Named area of a floor plan (patio, bar, main room)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FloorSection {
    pub section_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FloorPlanSnapshot {
    pub plan_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Member tables, each at most once
    #[serde(default)]
    pub table_ids: Vec<String>,
    #[serde(default)]
    pub sections: Vec<FloorSection>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorPlanCreate {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloorPlanUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}
