//! Table assignment optimizer model

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Table as seen by the optimizer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizableTable {
    pub table_id: String,
    pub number: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
    #[serde(default)]
    pub combinable: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Adjacent tables this one can be pushed together with; empty = any
    #[serde(default)]
    pub combinable_with: Vec<String>,
    #[serde(default = "default_combination_size")]
    pub max_combination_size: u32,
    #[serde(default)]
    pub is_occupied: bool,
    #[serde(default)]
    pub current_covers: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_server_id: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_combination_size() -> u32 {
    2
}

fn default_active() -> bool {
    true
}

impl OptimizableTable {
    pub fn new(table_id: impl Into<String>, number: impl Into<String>, min: u32, max: u32) -> Self {
        Self {
            table_id: table_id.into(),
            number: number.into(),
            min_capacity: min,
            max_capacity: max,
            combinable: false,
            tags: Vec::new(),
            combinable_with: Vec::new(),
            max_combination_size: default_combination_size(),
            is_occupied: false,
            current_covers: 0,
            current_server_id: None,
            is_active: true,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Adjacency allows `other` (an empty list allows everything)
    pub fn accepts(&self, other: &str) -> bool {
        self.combinable_with.is_empty() || self.combinable_with.iter().any(|id| id == other)
    }
}

/// 服务员分区
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    pub server_id: String,
    pub server_name: String,
    #[serde(default)]
    pub table_ids: Vec<String>,
    pub max_covers: u32,
    #[serde(default)]
    pub current_covers: u32,
}

impl ServerSection {
    pub fn load_percent(&self) -> f64 {
        if self.max_covers == 0 {
            return 0.0;
        }
        self.current_covers as f64 / self.max_covers as f64 * 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssignmentRequest {
    pub party_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seating_preference: Option<String>,
    #[serde(default)]
    pub is_vip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_table_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableRecommendation {
    /// One id for a single table, two for a combination
    pub table_ids: Vec<String>,
    pub table_numbers: Vec<String>,
    pub total_capacity: u32,
    pub score: f64,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default)]
    pub is_combination: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignmentResult {
    pub success: bool,
    pub recommendations: Vec<TableRecommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerWorkload {
    pub server_id: String,
    pub server_name: String,
    pub table_count: usize,
    pub current_covers: u32,
    pub max_covers: u32,
    pub load_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OptimizerSnapshot {
    pub tables: Vec<OptimizableTable>,
    pub sections: Vec<ServerSection>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl OptimizerSnapshot {
    pub fn table(&self, table_id: &str) -> Option<&OptimizableTable> {
        self.tables.iter().find(|t| t.table_id == table_id)
    }

    pub fn section_of(&self, table_id: &str) -> Option<&ServerSection> {
        self.sections
            .iter()
            .find(|s| s.table_ids.iter().any(|id| id == table_id))
    }
}
