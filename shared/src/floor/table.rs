//! Table model and events

use serde::{Deserialize, Serialize};

/// 桌台状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    #[default]
    Available,
    Reserved,
    Occupied,
    /// Guests left, needs bussing
    Dirty,
    OutOfService,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableShape {
    #[default]
    Square,
    Round,
    Rectangle,
    Booth,
    Bar,
}

/// Table snapshot - computed from event stream
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TableSnapshot {
    pub table_id: String,
    pub number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_plan_id: Option<String>,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub shape: TableShape,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub combinable: bool,
    pub status: TableStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_booking_id: Option<String>,
    pub current_covers: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seated_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_of_service_reason: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub version: u64,
}

impl TableSnapshot {
    pub fn is_created(&self) -> bool {
        !self.table_id.is_empty()
    }
}

/// Table events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableEvent {
    Created {
        table_id: String,
        number: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        floor_plan_id: Option<String>,
        min_capacity: u32,
        max_capacity: u32,
        shape: TableShape,
        tags: Vec<String>,
        combinable: bool,
        at: i64,
    },
    Updated {
        #[serde(skip_serializing_if = "Option::is_none")]
        number: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_capacity: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_capacity: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        shape: Option<TableShape>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tags: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        combinable: Option<bool>,
        at: i64,
    },
    Reserved {
        booking_id: String,
        at: i64,
    },
    ReservationReleased {
        at: i64,
    },
    Seated {
        #[serde(skip_serializing_if = "Option::is_none")]
        booking_id: Option<String>,
        covers: u32,
        at: i64,
    },
    Cleared {
        at: i64,
    },
    Cleaned {
        at: i64,
    },
    TakenOutOfService {
        reason: String,
        at: i64,
    },
    ReturnedToService {
        at: i64,
    },
    Deactivated {
        at: i64,
    },
}

/// Create table payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCreate {
    pub number: String,
    pub floor_plan_id: Option<String>,
    pub min_capacity: u32,
    pub max_capacity: u32,
    #[serde(default)]
    pub shape: TableShape,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub combinable: bool,
}

/// Update table payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableUpdate {
    pub number: Option<String>,
    pub min_capacity: Option<u32>,
    pub max_capacity: Option<u32>,
    pub shape: Option<TableShape>,
    pub tags: Option<Vec<String>>,
    pub combinable: Option<bool>,
}
